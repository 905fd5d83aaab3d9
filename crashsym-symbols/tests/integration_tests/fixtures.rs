//! Builds minimal Mach-O files for tests: a 64-bit header, a `__TEXT`
//! segment with one `__text` section, an `LC_UUID` command and an
//! `LC_SYMTAB` with the given symbols.

use std::path::Path;

const MH_MAGIC_64: u32 = 0xfeedfacf;
const MH_DSYM: u32 = 0xa;
const LC_SEGMENT_64: u32 = 0x19;
const LC_SYMTAB: u32 = 0x2;
const LC_UUID: u32 = 0x1b;
pub const CPU_TYPE_ARM64: u32 = 0x0100000c;
pub const CPU_TYPE_X86_64: u32 = 0x01000007;

const SEGMENT_CMD_SIZE: u32 = 72 + 80;
const UUID_CMD_SIZE: u32 = 24;
const SYMTAB_CMD_SIZE: u32 = 24;

fn pad16(name: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..name.len()].copy_from_slice(name);
    out
}

/// A thin 64-bit Mach-O whose symbols live at `vmaddr + offset`.
pub fn thin_macho(cputype: u32, uuid: [u8; 16], vmaddr: u64, symbols: &[(u64, &str)]) -> Vec<u8> {
    let mut strtab = vec![0u8];
    let mut string_offsets = Vec::with_capacity(symbols.len());
    for (_, name) in symbols {
        string_offsets.push(strtab.len() as u32);
        strtab.extend_from_slice(name.as_bytes());
        strtab.push(0);
    }

    let sizeofcmds = SEGMENT_CMD_SIZE + UUID_CMD_SIZE + SYMTAB_CMD_SIZE;
    let symoff = 32 + sizeofcmds;
    let stroff = symoff + symbols.len() as u32 * 16;

    let mut out = Vec::new();

    // mach_header_64
    out.extend_from_slice(&MH_MAGIC_64.to_le_bytes());
    out.extend_from_slice(&cputype.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // cpusubtype
    out.extend_from_slice(&MH_DSYM.to_le_bytes());
    out.extend_from_slice(&3u32.to_le_bytes()); // ncmds
    out.extend_from_slice(&sizeofcmds.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // flags
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved

    // LC_SEGMENT_64 __TEXT
    out.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
    out.extend_from_slice(&SEGMENT_CMD_SIZE.to_le_bytes());
    out.extend_from_slice(&pad16(b"__TEXT"));
    out.extend_from_slice(&vmaddr.to_le_bytes());
    out.extend_from_slice(&0x4000u64.to_le_bytes()); // vmsize
    out.extend_from_slice(&0u64.to_le_bytes()); // fileoff
    out.extend_from_slice(&0u64.to_le_bytes()); // filesize
    out.extend_from_slice(&5i32.to_le_bytes()); // maxprot
    out.extend_from_slice(&5i32.to_le_bytes()); // initprot
    out.extend_from_slice(&1u32.to_le_bytes()); // nsects
    out.extend_from_slice(&0u32.to_le_bytes()); // flags

    // section_64 __text
    out.extend_from_slice(&pad16(b"__text"));
    out.extend_from_slice(&pad16(b"__TEXT"));
    out.extend_from_slice(&vmaddr.to_le_bytes());
    out.extend_from_slice(&0x1000u64.to_le_bytes()); // size
    out.extend_from_slice(&0u32.to_le_bytes()); // offset
    out.extend_from_slice(&2u32.to_le_bytes()); // align
    out.extend_from_slice(&0u32.to_le_bytes()); // reloff
    out.extend_from_slice(&0u32.to_le_bytes()); // nreloc
    out.extend_from_slice(&0x80000400u32.to_le_bytes()); // S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    // LC_UUID
    out.extend_from_slice(&LC_UUID.to_le_bytes());
    out.extend_from_slice(&UUID_CMD_SIZE.to_le_bytes());
    out.extend_from_slice(&uuid);

    // LC_SYMTAB
    out.extend_from_slice(&LC_SYMTAB.to_le_bytes());
    out.extend_from_slice(&SYMTAB_CMD_SIZE.to_le_bytes());
    out.extend_from_slice(&symoff.to_le_bytes());
    out.extend_from_slice(&(symbols.len() as u32).to_le_bytes());
    out.extend_from_slice(&stroff.to_le_bytes());
    out.extend_from_slice(&(strtab.len() as u32).to_le_bytes());

    // nlist_64 entries
    for ((offset, _), strx) in symbols.iter().zip(string_offsets) {
        out.extend_from_slice(&strx.to_le_bytes());
        out.push(0x0f); // N_SECT | N_EXT
        out.push(1); // n_sect
        out.extend_from_slice(&0u16.to_le_bytes()); // n_desc
        out.extend_from_slice(&(vmaddr + offset).to_le_bytes());
    }

    out.extend_from_slice(&strtab);
    out
}

/// A 32-bit fat archive wrapping the given thin members.
pub fn fat_macho(members: &[Vec<u8>]) -> Vec<u8> {
    const FAT_MAGIC: u32 = 0xcafebabe;

    fn align_up(value: usize, align: usize) -> usize {
        (value + align - 1) & !(align - 1)
    }

    let mut offsets = Vec::with_capacity(members.len());
    let mut offset = align_up(8 + members.len() * 20, 16);
    for member in members {
        offsets.push(offset);
        offset = align_up(offset + member.len(), 16);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&FAT_MAGIC.to_be_bytes());
    out.extend_from_slice(&(members.len() as u32).to_be_bytes());
    for (member, member_offset) in members.iter().zip(&offsets) {
        let cputype = u32::from_le_bytes(member[4..8].try_into().unwrap());
        out.extend_from_slice(&cputype.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes()); // cpusubtype
        out.extend_from_slice(&(*member_offset as u32).to_be_bytes());
        out.extend_from_slice(&(member.len() as u32).to_be_bytes());
        out.extend_from_slice(&4u32.to_be_bytes()); // align, 2^4
    }
    for (member, member_offset) in members.iter().zip(&offsets) {
        out.resize(*member_offset, 0);
        out.extend_from_slice(member);
    }
    out
}

/// Writes a `Name.dSYM/Contents/Resources/DWARF/Name` bundle.
pub fn write_dsym_bundle(dir: &Path, name: &str, image: &[u8]) -> std::path::PathBuf {
    let bundle = dir.join(format!("{name}.dSYM"));
    let dwarf_dir = bundle.join("Contents/Resources/DWARF");
    std::fs::create_dir_all(&dwarf_dir).unwrap();
    std::fs::write(dwarf_dir.join(name), image).unwrap();
    bundle
}
