mod common;

mod tests {
    use dimmer_composer::ble::protocol::{BRIGHTNESS, IDENTIFY, IS_ON, SERVICE};
    use dimmer_composer::ble::{
        AddressType, Advertisement, BleAddress, BleClient, ClientEvent, ConnectionState,
        RadioChannel, RadioEvent, ScanState, Uuid,
    };
    use dimmer_composer::config::{MAX_UNKNOWN_DEVICES, PAUSE_BETWEEN_SCANS, SCAN_DURATION};
    use dimmer_composer::{BleError, Duration, Error, GattError};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::common::{MemoryStore, MockRadio, MockSleep, address, at, dimmer_service};

    fn advertisement(name: &str, last: u8) -> RadioEvent {
        RadioEvent::Advertisement(Advertisement::new(address(last)).with_name(name))
    }

    #[test]
    fn test_unknown_device_reported_once() {
        let channel = RadioChannel::new();
        let radio = MockRadio::default();
        let handle = radio.handle();
        let mut client = BleClient::new(radio, channel.receiver());
        let mut sleep = MockSleep::default();

        client.find_unknown_devices(true);
        client.tick(at(0), &mut sleep);
        assert_eq!(client.is_scanning(), true);
        assert_eq!(handle.borrow().scans_started, 1);
        assert_eq!(sleep.paused, 1);

        channel
            .sender()
            .try_send(advertisement("kitchen", 1))
            .unwrap();
        client.tick(at(100), &mut sleep);

        assert_eq!(
            client.poll_event(),
            Some(ClientEvent::UnknownDeviceFound {
                name: "kitchen".try_into().unwrap(),
                address: address(1),
            })
        );
        assert_eq!(client.poll_event(), None);
        assert_eq!(client.unknown_devices().len(), 1);
    }

    #[test]
    fn test_unknown_device_filters() {
        let channel = RadioChannel::new();
        let mut client = BleClient::new(MockRadio::default(), channel.receiver());
        let mut sleep = MockSleep::default();
        let wanted = Uuid::from_u16(0x180f);

        client.set_service_filter(wanted);
        client.set_duplicate_name_filter(true);
        client.find_unknown_devices(true);
        client.tick(at(0), &mut sleep);

        let sender = channel.sender();
        // Wrong service
        sender
            .try_send(RadioEvent::Advertisement(
                Advertisement::new(address(1))
                    .with_name("a")
                    .with_service(Uuid::from_u16(0x1800)),
            ))
            .unwrap();
        // No name
        sender
            .try_send(RadioEvent::Advertisement(
                Advertisement::new(address(2)).with_service(wanted),
            ))
            .unwrap();
        // Accepted, then filtered as a duplicate
        for _ in 0..2 {
            sender
                .try_send(RadioEvent::Advertisement(
                    Advertisement::new(address(3))
                        .with_name("b")
                        .with_service(wanted),
                ))
                .unwrap();
        }
        client.tick(at(10), &mut sleep);

        let mut found = 0;
        while let Some(event) = client.poll_event() {
            assert!(matches!(event, ClientEvent::UnknownDeviceFound { ref name, .. } if name == "b"));
            found += 1;
        }
        assert_eq!(found, 1);
    }

    #[test]
    fn test_unknown_device_list_is_bounded() {
        let channel = RadioChannel::new();
        let mut client = BleClient::new(MockRadio::default(), channel.receiver());
        let mut sleep = MockSleep::default();
        client.find_unknown_devices(true);
        client.tick(at(0), &mut sleep);

        let mut reported = Vec::new();
        for i in 0..=MAX_UNKNOWN_DEVICES {
            let name = format!("dev{i}");
            channel
                .sender()
                .try_send(advertisement(&name, i as u8))
                .unwrap();
            client.tick(at(10 * (i as u64 + 1)), &mut sleep);
            while let Some(ClientEvent::UnknownDeviceFound { name, .. }) = client.poll_event() {
                reported.push(name.to_string());
            }
        }

        assert_eq!(client.unknown_devices().len(), MAX_UNKNOWN_DEVICES);
        assert_eq!(client.unknown_devices().iter().any(|n| n == "dev8"), false);
        // Still reported, just not kept
        assert_eq!(reported.len(), MAX_UNKNOWN_DEVICES + 1);
        assert_eq!(reported.last().map(String::as_str), Some("dev8"));
    }

    #[test]
    fn test_manufacturer_filter() {
        let channel = RadioChannel::new();
        let mut client = BleClient::new(MockRadio::default(), channel.receiver());
        let mut sleep = MockSleep::default();

        client.set_manufacturer_filter(0x02e5);
        client.find_unknown_devices(true);
        client.tick(at(0), &mut sleep);

        let sender = channel.sender();
        sender
            .try_send(RadioEvent::Advertisement(
                Advertisement::new(address(1))
                    .with_name("other")
                    .with_manufacturer_data(&[0x4c, 0x00, 1]),
            ))
            .unwrap();
        sender
            .try_send(RadioEvent::Advertisement(
                Advertisement::new(address(2))
                    .with_name("ours")
                    .with_manufacturer_data(&[0xe5, 0x02, 7]),
            ))
            .unwrap();
        client.tick(at(10), &mut sleep);

        assert!(matches!(
            client.poll_event(),
            Some(ClientEvent::UnknownDeviceFound { ref name, .. }) if name == "ours"
        ));
        assert_eq!(client.poll_event(), None);
    }

    #[test]
    fn test_registered_device_resolves_and_scan_stops() {
        let channel = RadioChannel::new();
        let radio = MockRadio::default();
        let handle = radio.handle();
        let mut client = BleClient::new(radio, channel.receiver());
        let mut sleep = MockSleep::default();

        client.add_device("lamp").unwrap();
        assert_eq!(client.device_state("lamp"), Some(ConnectionState::Unbound));
        client.tick(at(0), &mut sleep);
        assert_eq!(client.is_scanning(), true);
        assert_eq!(client.connect("lamp"), Err(BleError::ScanActive));

        channel.sender().try_send(advertisement("lamp", 7)).unwrap();
        client.tick(at(50), &mut sleep);
        assert_eq!(client.address("lamp"), Some(address(7)));
        assert_eq!(
            client.poll_event(),
            Some(ClientEvent::DeviceResolved {
                name: "lamp".try_into().unwrap()
            })
        );

        // Everything is resolved: the next tick ends the scan.
        client.tick(at(60), &mut sleep);
        assert_eq!(client.state(), ScanState::Idle);
        assert_eq!(handle.borrow().scanning, false);
        assert_eq!(sleep.paused, 0);
        assert_eq!(client.device_state("lamp"), Some(ConnectionState::Available));

        client.connect("lamp").unwrap();
        assert_eq!(client.is_connected("lamp"), true);
        assert_eq!(handle.borrow().connects_while_scanning, 0);
    }

    #[test]
    fn test_scan_deadline_without_completion() {
        let channel = RadioChannel::new();
        let radio = MockRadio::default();
        let handle = radio.handle();
        let mut client = BleClient::new(radio, channel.receiver());
        let mut sleep = MockSleep::default();

        client.add_device("lamp").unwrap();
        client.tick(at(0), &mut sleep);
        assert_eq!(client.is_scanning(), true);

        let end = SCAN_DURATION.as_millis();
        client.tick(at(end - 1), &mut sleep);
        assert_eq!(client.is_scanning(), true);
        client.tick(at(end), &mut sleep);
        assert_eq!(client.is_scanning(), false);
        assert_eq!(handle.borrow().scanning, false);

        // Still unresolved: scanning resumes after the grace window.
        client.tick(at(end + 10), &mut sleep);
        assert_eq!(client.is_scanning(), false);
        client.tick(at(end + PAUSE_BETWEEN_SCANS.as_millis()), &mut sleep);
        assert_eq!(client.is_scanning(), true);
        assert_eq!(handle.borrow().scans_started, 2);
    }

    #[test]
    fn test_scan_complete_event_ends_session() {
        let channel = RadioChannel::new();
        let mut client = BleClient::new(MockRadio::default(), channel.receiver());
        let mut sleep = MockSleep::default();

        client.add_device("lamp").unwrap();
        client.tick(at(0), &mut sleep);
        channel.sender().try_send(RadioEvent::ScanComplete).unwrap();
        client.tick(at(3000), &mut sleep);
        assert_eq!(client.is_scanning(), false);
        assert_eq!(sleep.postponed.last(), Some(&Duration::from_millis(100)));
    }

    #[test]
    fn test_open_link_gets_one_grace_window_before_scan() {
        let channel = RadioChannel::new();
        let radio = MockRadio::default();
        let handle = radio.handle();
        let mut client = BleClient::new(radio, channel.receiver());
        let mut sleep = MockSleep::default();

        client.add_device("lamp").unwrap();
        client.set_address("lamp", address(1));
        client.tick(at(0), &mut sleep);
        client.connect("lamp").unwrap();

        client.add_device("desk").unwrap();
        client.tick(at(10), &mut sleep);
        assert_eq!(client.is_scanning(), false);
        assert_eq!(client.is_connected("lamp"), true);

        let retry = 10 + PAUSE_BETWEEN_SCANS.as_millis();
        client.tick(at(retry), &mut sleep);
        assert_eq!(client.is_scanning(), true);
        assert_eq!(client.is_connected("lamp"), false);
        assert_eq!(handle.borrow().connected.len(), 0);
    }

    #[test]
    fn test_connect_failure_forgets_address() {
        let channel = RadioChannel::new();
        let radio = MockRadio::default();
        radio.state.borrow_mut().fail_connect = true;
        let mut client = BleClient::new(radio, channel.receiver());

        client.add_device("lamp").unwrap();
        client.set_address("lamp", address(1));
        assert_eq!(client.connect("lamp"), Err(BleError::ConnectFailed));
        assert_eq!(client.address("lamp"), None);
        assert_eq!(client.connect("missing"), Err(BleError::UnknownDevice));
    }

    #[test]
    fn test_discovery_closes_links_and_relearns_address() {
        let channel = RadioChannel::new();
        let mut client = BleClient::new(MockRadio::default(), channel.receiver());
        let mut sleep = MockSleep::default();

        client.add_device("lamp").unwrap();
        client.set_address("lamp", address(1));
        client.connect("lamp").unwrap();

        // Discovery does not wait for open links.
        client.find_unknown_devices(true);
        client.tick(at(0), &mut sleep);
        assert_eq!(client.is_scanning(), true);
        assert_eq!(client.is_connected("lamp"), false);

        channel.sender().try_send(advertisement("lamp", 2)).unwrap();
        client.tick(at(10), &mut sleep);
        assert_eq!(client.address("lamp"), Some(address(2)));
        assert_eq!(client.unknown_devices().len(), 0);
    }

    #[test]
    fn test_link_access() {
        let channel = RadioChannel::new();
        let radio = MockRadio::default();
        dimmer_service(&radio);
        let handle = radio.handle();
        let mut client = BleClient::new(radio, channel.receiver());

        client.add_device("lamp").unwrap();
        assert!(matches!(client.link("lamp"), Err(BleError::NotConnected)));
        client.set_address("lamp", address(1));
        client.connect("lamp").unwrap();

        let mut link = client.link("lamp").unwrap();
        link.set_u16(&SERVICE, &BRIGHTNESS, 0x1234).unwrap();
        assert_eq!(link.get_u16(&SERVICE, &BRIGHTNESS).unwrap(), 0x1234);
        link.set_u8(&SERVICE, &IS_ON, 1).unwrap();
        assert_eq!(link.get_u8(&SERVICE, &IS_ON).unwrap(), 1);
        assert_eq!(
            link.get_u32(&SERVICE, &IS_ON),
            Err(Error::Gatt(GattError::SizeMismatch))
        );
        assert_eq!(
            link.get(&SERVICE, &IDENTIFY),
            Err(Error::Gatt(GattError::NotReadable))
        );
        assert_eq!(
            link.set(&SERVICE, &Uuid::from_u16(0x2a00), &[1]),
            Err(Error::Gatt(GattError::NotFound))
        );
        link.set_str(&SERVICE, &BRIGHTNESS, "hi").unwrap();
        assert_eq!(link.get_string(&SERVICE, &BRIGHTNESS).unwrap(), "hi");

        fn on_change(_address: &BleAddress, _value: &[u8]) {}
        link.subscribe(&SERVICE, &BRIGHTNESS, on_change).unwrap();
        assert_eq!(
            link.subscribe(&SERVICE, &IS_ON, on_change),
            Err(Error::Ble(BleError::AlreadySubscribed))
        );
        link.unsubscribe();
        assert_eq!(
            link.subscribe(&SERVICE, &IDENTIFY, on_change),
            Err(Error::Gatt(GattError::NotNotifiable))
        );
        assert_eq!(handle.borrow().subscriptions.len(), 1);
    }

    #[test]
    fn test_registry_persistence() {
        let channel = RadioChannel::new();
        let mut client = BleClient::new(MockRadio::default(), channel.receiver());
        client.add_device("lamp").unwrap();
        client.add_device("desk").unwrap();
        client.set_address(
            "desk",
            BleAddress::new([1, 2, 3, 4, 5, 6], AddressType::Random),
        );
        assert_eq!(client.is_dirty(), true);

        let mut store = MemoryStore::default();
        client.save(&mut store, "bleClient");
        assert_eq!(client.is_dirty(), false);

        let other_channel = RadioChannel::new();
        let mut restored = BleClient::new(MockRadio::default(), other_channel.receiver());
        restored.load(&store, "bleClient");
        assert_eq!(restored.registry().len(), 2);
        assert_eq!(restored.address("lamp"), None);
        assert_eq!(
            restored.address("desk"),
            Some(BleAddress::new([1, 2, 3, 4, 5, 6], AddressType::Random))
        );

        restored.del_device("lamp");
        assert_eq!(restored.device("lamp").is_none(), true);
        assert_eq!(restored.is_dirty(), true);
    }

    #[test]
    fn test_advertisement_parse() {
        let data = [
            0x02, 0x01, 0x06, // flags
            0x03, 0x03, 0x0f, 0x18, // 16-bit service 0x180f
            0x05, 0x09, b'l', b'a', b'm', b'p', // complete name
            0x04, 0xff, 0xe5, 0x02, 0x01, // manufacturer data
            0x09, 0x09, b'x', // truncated structure
        ];
        let adv = Advertisement::parse(address(1), &data);
        assert_eq!(adv.name.as_deref(), Some("lamp"));
        assert_eq!(adv.advertises_service(&Uuid::from_u16(0x180f)), true);
        assert_eq!(adv.manufacturer_id(), Some(0x02e5));
    }

    #[test]
    fn test_address_text_form() {
        let address = BleAddress::parse("c0:ff:ee:00:00:2a", AddressType::Public).unwrap();
        assert_eq!(address.bytes, [0xc0, 0xff, 0xee, 0, 0, 0x2a]);
        assert_eq!(address.to_text(), "c0:ff:ee:00:00:2a");
        assert_eq!(BleAddress::parse("c0:ff:ee", AddressType::Public), None);
        assert_eq!(BleAddress::parse("c0:ff:ee:00:00:2a:00", AddressType::Public), None);
    }

    #[test]
    fn test_connect_never_overlaps_scan() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..50 {
            let channel = RadioChannel::new();
            let radio = MockRadio::default();
            let handle = radio.handle();
            let mut client = BleClient::new(radio, channel.receiver());
            let mut sleep = MockSleep::default();
            let names = ["a", "b", "c"];
            let mut now = 0u64;

            for _ in 0..200 {
                now += rng.gen_range(1..800);
                match rng.gen_range(0..7) {
                    0 => {
                        let _ = client.add_device(names[rng.gen_range(0..3)]);
                    }
                    1 => {
                        let i = rng.gen_range(0..3u8);
                        let _ = channel.sender().try_send(advertisement(names[i as usize], i));
                    }
                    2 => {
                        handle.borrow_mut().scanning = false;
                        let _ = channel.sender().try_send(RadioEvent::ScanComplete);
                    }
                    3 => client.find_unknown_devices(rng.gen_bool(0.5)),
                    4 => client.device_not_seen(names[rng.gen_range(0..3)]),
                    _ => {
                        let result = client.connect(names[rng.gen_range(0..3)]);
                        if client.is_scanning() {
                            assert_eq!(result, Err(BleError::ScanActive));
                        }
                    }
                }
                client.tick(at(now), &mut sleep);
                assert_eq!(handle.borrow().connects_while_scanning, 0);
            }
        }
    }
}
