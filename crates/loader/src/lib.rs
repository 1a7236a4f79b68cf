// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, bail, Context, Result};
use goblin::elf::header::EM_RISCV;
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use selftest_core::memory::ProgramImage;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub fn load_elf(path: &Path) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    load_elf_bytes(&buffer).with_context(|| format!("Failed to load {:?}", path))
}

/// Build a program image from the PT_LOAD segments of a 32-bit RISC-V ELF.
///
/// Segments are placed at their physical address. Bytes past `p_filesz` up to
/// `p_memsz` are zero so `.bss` starts cleared.
pub fn load_elf_bytes(buffer: &[u8]) -> Result<ProgramImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    if elf.header.e_machine != EM_RISCV {
        bail!(
            "Unsupported ELF machine {} (expected RISC-V)",
            elf.header.e_machine
        );
    }
    if elf.is_64 {
        bail!("64-bit ELF images are not supported");
    }

    info!("ELF Entry Point: {:#x}", elf.entry);

    let mut program_image = ProgramImage::new(elf.entry);

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD || ph.p_memsz == 0 {
            continue;
        }

        let start_addr = ph.p_paddr;
        let file_size = ph.p_filesz as usize;
        let mem_size = ph.p_memsz as usize;
        let offset = ph.p_offset as usize;

        debug!(
            "Found Loadable Segment: Addr={:#x}, File={} bytes, Mem={} bytes, Offset={:#x}",
            start_addr, file_size, mem_size, offset
        );

        if mem_size < file_size {
            return Err(anyhow!(
                "Segment at {:#x} has p_memsz smaller than p_filesz",
                start_addr
            ));
        }
        let end = offset
            .checked_add(file_size)
            .filter(|end| *end <= buffer.len())
            .ok_or_else(|| anyhow!("Segment out of bounds in ELF file"))?;

        let mut segment_data = buffer[offset..end].to_vec();
        segment_data.resize(mem_size, 0);
        program_image.add_segment(start_addr, segment_data);
    }

    if program_image.segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    Ok(program_image)
}
