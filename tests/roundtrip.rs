//! Whole-disk integration coverage: driving a track through the full
//! analyser dispatch chain and a container's open/close lifecycle, rather
//! than exercising a single handler or container module in isolation.

use std::io::Cursor;

use amimfm::container::ContainerFormat;
use amimfm::disk::{Disk, TrackInfo, TrackInfoFlags};
use amimfm::handler::registry::standard_registry;
use amimfm::handler::Handler;
use amimfm::handlers::amigados::{AmigaDos, SECTORS_PER_TRACK, SECTOR_BYTES};
use amimfm::stream::{rpm, SoftStream, Stream};
use amimfm::tbuf::TrackBuffer;

fn init_logging() {
    let _ = env_logger::try_init();
}

/// Re-encode an AmigaDOS track, run it back through the full dispatch chain,
/// and carry the result through a canonical bundle round trip.
#[test]
fn amigados_track_survives_dispatch_and_bundle_round_trip() {
    init_logging();

    let payload: Vec<u8> = (0..SECTORS_PER_TRACK * SECTOR_BYTES)
        .map(|i| (i * 7 + 3) as u8)
        .collect();

    let mut seed_disk = Disk::new();
    seed_disk
        .set_track(
            0,
            TrackInfo {
                type_name: "amigados".to_string(),
                bytes_per_sector: SECTOR_BYTES as u16,
                nr_sectors: SECTORS_PER_TRACK as u8,
                valid_sectors: (1u32 << SECTORS_PER_TRACK) - 1,
                payload: payload.clone(),
                data_bitoff: 0,
                total_bits: 100_150,
                weak: Vec::new(),
                flags: TrackInfoFlags::empty(),
            },
        )
        .unwrap();

    let mut tbuf = TrackBuffer::new(1);
    AmigaDos.read_raw(&seed_disk, 0, &mut tbuf).unwrap();
    let (bits, speed, bitlen) = tbuf.materialize();

    let backend = SoftStream::new(bits, Some(speed), bitlen, rpm::DEFAULT_RPM);
    let mut stream = Stream::new(Box::new(backend));

    let registry = standard_registry();
    let empty_disk = Disk::new();
    let info = amimfm::analyser::write_raw(&empty_disk, &registry, 0, &mut stream, None).unwrap();
    assert_eq!(info.type_name, "amigados");
    assert_eq!(info.payload, payload);

    let mut result_disk = Disk::new();
    result_disk.set_track(0, info).unwrap();

    let mut buf = Vec::new();
    ContainerFormat::Bundle.close(&result_disk, &mut buf).unwrap();
    let mut cursor = Cursor::new(buf);
    let detected = ContainerFormat::detect(&mut cursor).unwrap();
    assert_eq!(detected, Some(ContainerFormat::Bundle));
    cursor.set_position(0);
    let reopened = ContainerFormat::Bundle.open(&mut cursor).unwrap();
    assert_eq!(reopened.track(0).unwrap().payload, payload);
}

/// A track of uniform random flux noise should be claimed by the
/// `unformatted` handler through the normal dispatch chain, never mistaken
/// for a `raw_dd` capture of real data.
#[test]
fn noise_track_is_recognized_as_unformatted_through_dispatch() {
    init_logging();

    let mut state = 0xDEAD_BEEFu32;
    let noise: Vec<u8> = (0..(100_150 / 8))
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 8) as u8
        })
        .collect();
    let bitlen = noise.len() as u32 * 8;

    let backend = SoftStream::new(noise, None, bitlen, rpm::DEFAULT_RPM);
    let mut stream = Stream::new(Box::new(backend));

    let registry = standard_registry();
    let disk = Disk::new();
    let info = amimfm::analyser::write_raw(&disk, &registry, 0, &mut stream, None).unwrap();
    assert_eq!(info.type_name, "unformatted");
    assert_eq!(info.total_bits, amimfm::WEAK);
}

/// A fully-formatted AmigaDOS disk converts cleanly to ADF and back; any
/// track the container can't represent aborts the whole write instead of
/// silently truncating the image.
#[test]
fn amigados_disk_converts_to_adf_and_back() {
    init_logging();

    let mut disk = Disk::new();
    for tracknr in 0..amimfm::NR_TRACKS {
        let payload: Vec<u8> = (0..SECTORS_PER_TRACK * SECTOR_BYTES)
            .map(|i| (tracknr as u8).wrapping_add(i as u8))
            .collect();
        disk.set_track(
            tracknr,
            TrackInfo {
                type_name: "amigados".to_string(),
                bytes_per_sector: SECTOR_BYTES as u16,
                nr_sectors: SECTORS_PER_TRACK as u8,
                valid_sectors: (1u32 << SECTORS_PER_TRACK) - 1,
                payload,
                data_bitoff: 0,
                total_bits: 100_150,
                weak: Vec::new(),
                flags: TrackInfoFlags::empty(),
            },
        )
        .unwrap();
    }

    let mut buf = Vec::new();
    ContainerFormat::Adf.close(&disk, &mut buf).unwrap();
    let mut cursor = Cursor::new(buf);
    let reopened = ContainerFormat::Adf.open(&mut cursor).unwrap();
    assert_eq!(reopened.track(0).unwrap().payload, disk.track(0).unwrap().payload);
    assert_eq!(reopened.track(159).unwrap().payload, disk.track(159).unwrap().payload);
}

#[test]
fn container_format_by_name_uses_the_strum_derive() {
    assert_eq!(ContainerFormat::by_name("bundle"), Some(ContainerFormat::Bundle));
    assert_eq!(ContainerFormat::by_name("mfm"), Some(ContainerFormat::RawMfm));
    assert_eq!(ContainerFormat::by_name("nonexistent"), None);
}
