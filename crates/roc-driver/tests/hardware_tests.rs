//! Tests against installed cards
//!
//! Run with `cargo test -- --ignored` on a machine with a C-RORC or CRU.

use roc_driver::prelude::*;
use roc_driver::ScaState;

#[test]
#[ignore] // Requires hardware
fn test_every_card_is_described() {
    let finder = DeviceFinder::new(SysfsPci::new());
    let cards = finder.find_all().expect("Enumeration");
    assert!(!cards.is_empty(), "No readout cards installed");

    for card in &cards {
        println!(
            "{} {} {} NUMA {} serial {:?}",
            card.card_type(),
            card.pci_address(),
            card.pci_id(),
            card.numa_node(),
            card.serial_number()
        );
    }
}

#[test]
#[ignore] // Requires hardware
fn test_resolve_by_address_matches_listing() {
    let finder = DeviceFinder::new(SysfsPci::new());
    let cards = finder.find_all().expect("Enumeration");
    let first = cards.first().expect("At least one card");

    let resolved = finder
        .resolve(&CardId::Address(first.pci_address()))
        .expect("Resolve by address");
    assert_eq!(&resolved.descriptor, first);
}

#[test]
#[ignore] // Requires hardware
fn test_cru_housekeeping_and_sca() {
    let finder = DeviceFinder::new(SysfsPci::new());
    let cards = finder.find_all().expect("Enumeration");
    let Some(cru) = cards.iter().find(|card| card.card_type() == CardType::Cru) else {
        println!("No CRU installed");
        return;
    };

    let parameters = Parameters::make_parameters(cru.pci_address().into(), 2);
    let mut session = Session::open(&finder, &parameters).expect("Open BAR 2");

    {
        let mut bar = session.card_bar().expect("CRU accessors");
        println!("Temperature: {:?}", bar.temperature().expect("Temperature"));
        println!("Firmware: {:?}", bar.firmware_info().expect("Firmware info"));
        assert_eq!(bar.serial().expect("Serial"), cru.serial_number());
    }

    let mut sca = session.sca();
    sca.initialize().expect("SCA initialize");
    assert_eq!(sca.state(), ScaState::Idle);
    println!("GPIO: {}", sca.gpio_read().expect("GPIO read"));
}
