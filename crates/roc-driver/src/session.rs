//! A card and one mapped BAR, opened from [`Parameters`]
//!
//! This is the front-end control flow in one place: take the card ID and
//! channel number from the configuration, resolve the card, map the BAR the
//! channel number names, and hand out register accessors borrowing it.

use crate::bar::{BarBinding, CardBar, RegisterReadWrite};
use crate::card::CardDescriptor;
use crate::discovery::{DeviceFinder, ResolvedCard};
use crate::error::{Result, RocError};
use crate::parameters::Parameters;
use crate::pci::PciAccess;
use crate::sca::Sca;

/// An opened card with one mapped BAR
#[derive(Debug)]
pub struct Session<W> {
    descriptor: CardDescriptor,
    window: W,
}

impl<W: RegisterReadWrite> Session<W> {
    /// Resolve the configured card and map the BAR named by the channel number
    ///
    /// # Errors
    ///
    /// Returns `RocError::Configuration` if the card ID or channel number is
    /// missing or the channel number is negative, `RocError::NotFound` if
    /// no card matches, and any error of mapping the BAR.
    pub fn open<P>(finder: &DeviceFinder<P>, parameters: &Parameters) -> Result<Self>
    where
        P: PciAccess<Window = W>,
    {
        let card_id = parameters.card_id_required()?;
        let channel = parameters.channel_number_required()?;
        let bar_index = usize::try_from(channel).map_err(|_| {
            RocError::configuration(
                "ChannelNumber",
                format!("channel {channel} is not a valid BAR index"),
            )
        })?;

        let card = finder.resolve(&card_id)?;
        Self::map(finder.pci(), card, bar_index)
    }

    /// Map BAR `bar_index` of an already resolved card
    ///
    /// # Errors
    ///
    /// Returns any error of mapping the BAR.
    pub fn map<P>(pci: &P, card: ResolvedCard<P::Handle>, bar_index: usize) -> Result<Self>
    where
        P: PciAccess<Window = W>,
    {
        let window = pci.map_bar(&card.handle, bar_index)?;

        tracing::info!(
            "Opened {} {} BAR{bar_index}",
            card.descriptor.card_type(),
            card.descriptor.pci_address()
        );

        Ok(Self {
            descriptor: card.descriptor,
            window,
        })
    }

    /// Session over an already mapped window
    pub const fn new(descriptor: CardDescriptor, window: W) -> Self {
        Self { descriptor, window }
    }

    /// The opened card
    pub const fn descriptor(&self) -> &CardDescriptor {
        &self.descriptor
    }

    /// BAR index of the mapped window
    pub fn bar_index(&self) -> usize {
        self.window.bar_index()
    }

    /// Raw register window
    pub fn window(&mut self) -> &mut W {
        &mut self.window
    }

    /// Register interface bound to the card's family
    pub fn bar(&mut self) -> BarBinding<'_, W> {
        BarBinding::new(&mut self.window, self.descriptor.card_type())
    }

    /// Typed accessors for the card's family
    ///
    /// # Errors
    ///
    /// Returns `RocError::Configuration` for an unknown card type.
    pub fn card_bar(&mut self) -> Result<CardBar<'_, W>> {
        CardBar::new(&mut self.window, self.descriptor.card_type())
    }

    /// SCA engine over the window
    pub fn sca(&mut self) -> Sca<'_, W> {
        Sca::new(&mut self.window, self.descriptor.card_type())
    }
}
