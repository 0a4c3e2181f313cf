//! Card-agnostic channel configuration
//!
//! [`Parameters`] is a sparse configuration object: every setting is
//! optional and independent of every other. Per setting it offers
//!
//! * a setter, returning `&mut Self` for chaining,
//! * a non-failing getter returning `Option<T>`,
//! * a `*_required` getter failing with `RocError::Configuration` when the
//!   setting is absent.
//!
//! Cross-field validity (for example "the data generator needs a loopback
//! mode other than `None`") is the consumer's business.

mod address;
mod types;

pub use address::{CardId, PciAddress};
pub use types::{
    parse_link_mask, BufferParameters, GeneratorPattern, LinkMask, LoopbackMode, ReadoutMode,
    MAX_LINK,
};

use crate::error::{Result, RocError};

macro_rules! parameters {
    ($(
        $(#[$doc:meta])*
        $key:literal => $field:ident: $ty:ty, $set:ident, $required:ident;
    )*) => {
        /// Channel configuration; see the module documentation
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct Parameters {
            $($field: Option<$ty>,)*
        }

        impl Parameters {
            $(
                $(#[$doc])*
                pub fn $set(&mut self, value: $ty) -> &mut Self {
                    self.$field = Some(value);
                    self
                }

                #[doc = concat!("The ", $key, " parameter, or `None` if it was not set")]
                #[must_use]
                pub fn $field(&self) -> Option<$ty> {
                    self.$field.clone()
                }

                #[doc = concat!("The ", $key, " parameter")]
                ///
                /// # Errors
                ///
                /// Returns `RocError::Configuration` if the parameter was not set.
                pub fn $required(&self) -> Result<$ty> {
                    self.$field.clone().ok_or_else(|| RocError::missing_parameter($key))
                }
            )*
        }
    };
}

parameters! {
    /// Sets the card to open, by serial number or PCI address.
    ///
    /// Required by every front-end.
    "CardId" => card_id: CardId, set_card_id, card_id_required;

    /// Sets the DMA channel to open.
    ///
    /// The C-RORC has six channels (0 to 5), the CRU one (0). Register tools
    /// use the channel number as the BAR index.
    "ChannelNumber" => channel_number: i32, set_channel_number, channel_number_required;

    /// Sets the DMA page size in bytes. The CRU only supports 8 KiB.
    "DmaPageSize" => dma_page_size: usize, set_dma_page_size, dma_page_size_required;

    /// Enables the card's internal data generator.
    ///
    /// Not valid together with [`LoopbackMode::None`].
    "GeneratorEnabled" => generator_enabled: bool, set_generator_enabled, generator_enabled_required;

    /// Sets the size in bytes of generated data per DMA page.
    ///
    /// C-RORC: multiples of 4 bytes up to 2 MiB. CRU: multiples of 32 bytes,
    /// 32 bytes to 8 KiB.
    "GeneratorDataSize" => generator_data_size: usize, set_generator_data_size, generator_data_size_required;

    /// Sets the routing of generated data.
    "GeneratorLoopback" => generator_loopback: LoopbackMode, set_generator_loopback, generator_loopback_required;

    /// Sets the content of generated data.
    ///
    /// The CRU supports constant, alternating and incremental patterns.
    "GeneratorPattern" => generator_pattern: GeneratorPattern, set_generator_pattern, generator_pattern_required;

    /// Makes generated pages vary in size between 32 bytes and the DMA page size.
    "GeneratorRandomSizeEnabled" => generator_random_size_enabled: bool,
        set_generator_random_size_enabled, generator_random_size_enabled_required;

    /// Registers the DMA buffer of the channel.
    "BufferParameters" => buffer_parameters: BufferParameters, set_buffer_parameters, buffer_parameters_required;

    /// Sets the readout mode.
    "ReadoutMode" => readout_mode: ReadoutMode, set_readout_mode, readout_mode_required;

    /// Sets the links to enable. See [`parse_link_mask`] for the string form.
    "LinkMask" => link_mask: LinkMask, set_link_mask, link_mask_required;
}

impl Parameters {
    /// Empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with card ID and channel number, the two settings every
    /// front-end needs
    #[must_use]
    pub fn make_parameters(card_id: CardId, channel: i32) -> Self {
        let mut parameters = Self::new();
        parameters.set_card_id(card_id).set_channel_number(channel);
        parameters
    }

    /// Parse a link mask string; see [`parse_link_mask`]
    ///
    /// # Errors
    ///
    /// Returns `RocError::Parse` on malformed input.
    pub fn link_mask_from_string(string: &str) -> Result<LinkMask> {
        parse_link_mask(string)
    }

    /// Parse a card ID: a serial number (`"12345"`) or PCI address (`"42:0.0"`)
    ///
    /// # Errors
    ///
    /// Returns `RocError::Parse` on malformed input and
    /// `RocError::Configuration` on PCI address components out of range.
    pub fn card_id_from_string(string: &str) -> Result<CardId> {
        string.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_parameters_are_empty() {
        let p = Parameters::new();
        assert_eq!(p.card_id(), None);
        assert_eq!(p.channel_number(), None);
        assert_eq!(p.dma_page_size(), None);
        assert_eq!(p.generator_enabled(), None);
        assert_eq!(p.generator_data_size(), None);
        assert_eq!(p.generator_loopback(), None);
        assert_eq!(p.generator_pattern(), None);
        assert_eq!(p.generator_random_size_enabled(), None);
        assert_eq!(p.buffer_parameters(), None);
        assert_eq!(p.readout_mode(), None);
        assert_eq!(p.link_mask(), None);
    }

    #[test]
    fn required_getters_fail_with_key() {
        let p = Parameters::new();
        let keys = [
            p.card_id_required().map(|_| ()).unwrap_err(),
            p.channel_number_required().map(|_| ()).unwrap_err(),
            p.dma_page_size_required().map(|_| ()).unwrap_err(),
            p.generator_enabled_required().map(|_| ()).unwrap_err(),
            p.generator_data_size_required().map(|_| ()).unwrap_err(),
            p.generator_loopback_required().map(|_| ()).unwrap_err(),
            p.generator_pattern_required().map(|_| ()).unwrap_err(),
            p.generator_random_size_enabled_required().map(|_| ()).unwrap_err(),
            p.buffer_parameters_required().map(|_| ()).unwrap_err(),
            p.readout_mode_required().map(|_| ()).unwrap_err(),
            p.link_mask_required().map(|_| ()).unwrap_err(),
        ]
        .map(|e| e.key());

        assert_eq!(
            keys,
            [
                Some("CardId"),
                Some("ChannelNumber"),
                Some("DmaPageSize"),
                Some("GeneratorEnabled"),
                Some("GeneratorDataSize"),
                Some("GeneratorLoopback"),
                Some("GeneratorPattern"),
                Some("GeneratorRandomSizeEnabled"),
                Some("BufferParameters"),
                Some("ReadoutMode"),
                Some("LinkMask"),
            ]
        );
    }

    #[test]
    fn set_then_get() {
        let mut p = Parameters::new();
        p.set_card_id(CardId::Serial(12345))
            .set_channel_number(2)
            .set_dma_page_size(8 * 1024)
            .set_generator_enabled(true)
            .set_generator_data_size(512)
            .set_generator_loopback(LoopbackMode::Internal)
            .set_generator_pattern(GeneratorPattern::Incremental)
            .set_generator_random_size_enabled(false)
            .set_buffer_parameters(BufferParameters::Null)
            .set_readout_mode(ReadoutMode::Continuous)
            .set_link_mask(LinkMask::from([0, 1, 2]));

        assert_eq!(p.card_id(), Some(CardId::Serial(12345)));
        assert_eq!(p.card_id_required().unwrap(), CardId::Serial(12345));
        assert_eq!(p.channel_number_required().unwrap(), 2);
        assert_eq!(p.dma_page_size_required().unwrap(), 8192);
        assert!(p.generator_enabled_required().unwrap());
        assert_eq!(p.generator_data_size_required().unwrap(), 512);
        assert_eq!(p.generator_loopback_required().unwrap(), LoopbackMode::Internal);
        assert_eq!(p.generator_pattern_required().unwrap(), GeneratorPattern::Incremental);
        assert!(!p.generator_random_size_enabled_required().unwrap());
        assert_eq!(p.buffer_parameters_required().unwrap(), BufferParameters::Null);
        assert_eq!(p.readout_mode_required().unwrap(), ReadoutMode::Continuous);
        assert_eq!(p.link_mask_required().unwrap(), LinkMask::from([0, 1, 2]));
    }

    #[test]
    fn last_write_wins() {
        let mut p = Parameters::new();
        p.set_channel_number(0).set_channel_number(5);
        assert_eq!(p.channel_number(), Some(5));
    }

    #[test]
    fn fields_are_independent() {
        let mut p = Parameters::new();
        p.set_generator_enabled(true);
        // No loopback set, still accepted: consumers validate combinations
        assert_eq!(p.generator_enabled(), Some(true));
        assert_eq!(p.generator_loopback(), None);
    }

    #[test]
    fn make_parameters_sets_both() {
        let address = PciAddress::new(0x42, 0, 0).unwrap();
        let p = Parameters::make_parameters(address.into(), 2);
        assert_eq!(p.card_id(), Some(CardId::Address(address)));
        assert_eq!(p.channel_number(), Some(2));
        assert_eq!(p.link_mask(), None);
    }

    #[test]
    fn string_helpers() {
        assert_eq!(
            Parameters::card_id_from_string("12345").unwrap(),
            CardId::Serial(12345)
        );
        assert!(matches!(
            Parameters::card_id_from_string("abc"),
            Err(RocError::Parse { .. })
        ));
        assert_eq!(
            Parameters::link_mask_from_string("0,1,2,8-10").unwrap(),
            LinkMask::from([0, 1, 2, 8, 9, 10])
        );
    }
}
