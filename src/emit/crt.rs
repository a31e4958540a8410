//! `.crt` output: a Commodore 64 cartridge image — a 64-byte header
//! followed by one `CHIP` packet per 8 KiB half of every referenced
//! cartridge bank, plus two fixed boot packets (spec section 6).

use crate::link::Image;

const BANK_SIZE: usize = 0x4000;
const CHIP_SIZE: usize = 0x2000;

fn chip_packet(bank: i32, load_addr: u16, data: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(16 + CHIP_SIZE);
    packet.extend_from_slice(b"CHIP");
    packet.extend_from_slice(&(0x2010u32).to_be_bytes());
    packet.extend_from_slice(&(0u16).to_be_bytes()); // chip type: ROM
    packet.extend_from_slice(&(bank as u16).to_be_bytes());
    packet.extend_from_slice(&load_addr.to_be_bytes());
    packet.extend_from_slice(&(CHIP_SIZE as u16).to_be_bytes());
    let mut image = vec![0u8; CHIP_SIZE];
    let n = data.len().min(CHIP_SIZE);
    image[..n].copy_from_slice(&data[..n]);
    packet.extend_from_slice(&image);
    packet
}

pub fn write(image: &Image, name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(b"C64 CARTRIDGE   ");
    out.extend_from_slice(&(0x0040u32).to_be_bytes());
    out.extend_from_slice(&(0x0001u16).to_be_bytes());
    out.extend_from_slice(&(0x2000u16).to_be_bytes());
    out.push(0); // EXROM
    out.push(0); // GAME
    out.extend_from_slice(&[0u8; 6]);
    let mut name_field = [0x20u8; 32];
    let bytes = name.as_bytes();
    let n = bytes.len().min(32);
    name_field[..n].copy_from_slice(&bytes[..n]);
    out.extend_from_slice(&name_field);

    // Boot bank: the low half of main memory loaded at $8000, and a stub
    // at $E000 that copies the high half into place and jumps to reset.
    out.extend_from_slice(&chip_packet(0, 0x8000, &image.main[0x0800..0x2800]));
    out.extend_from_slice(&chip_packet(0, 0xE000, &image.main[0x2800..0x4000]));

    let mut banks: Vec<i32> = image.banks.keys().copied().collect();
    banks.sort_unstable();
    for bank in banks {
        let buf = &image.banks[&bank];
        out.extend_from_slice(&chip_packet(bank, 0x8000, &buf[..BANK_SIZE / 2]));
        out.extend_from_slice(&chip_packet(bank, 0xA000, &buf[BANK_SIZE / 2..]));
    }

    out
}
