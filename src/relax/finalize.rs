//! Finalize: once no section reports further change, rewrite each
//! executable section's raw bytes and relocation list into their shrunk
//! form.

use alloc::vec::Vec;

use crate::error::{internal, Result};
use crate::reloc::kind::{RelocKind, Relocation};

use super::{RelaxAux, Write};

const MAX_SHRINK: u64 = 65535;

fn write_nop_sequence(out: &mut Vec<u8>, mut n: u64) {
    while n >= 4 {
        out.extend_from_slice(&0x0000_0013u32.to_le_bytes());
        n -= 4;
    }
    if n == 2 {
        out.extend_from_slice(&0x0001u16.to_le_bytes());
    }
}

fn remove_at(aux: &RelaxAux, i: usize) -> u64 {
    let prior = if i == 0 { 0 } else { aux.reloc_deltas[i - 1] };
    aux.reloc_deltas[i] - prior
}

/// Rewrites `raw` and `relocations` according to the outcome recorded in
/// `aux` by the final (non-changing) relaxation pass.
pub fn finalize(raw: &[u8], relocations: &[Relocation], aux: &RelaxAux) -> Result<(Vec<u8>, Vec<Relocation>)> {
    let total_removed = *aux.reloc_deltas.last().unwrap_or(&0);
    if total_removed > MAX_SHRINK {
        return Err(internal("section shrink exceeds the 65535-byte hard limit"));
    }
    let new_len = (raw.len() as u64)
        .checked_sub(total_removed)
        .ok_or_else(|| internal("section shrink exceeds the section's own size"))?;

    let mut out = Vec::with_capacity(new_len as usize);
    let mut src_pos: u64 = 0;

    for (i, r) in relocations.iter().enumerate() {
        let kind = aux.reloc_types[i];
        if kind == RelocKind::None {
            continue;
        }
        if r.offset > src_pos {
            out.extend_from_slice(&raw[src_pos as usize..r.offset as usize]);
            src_pos = r.offset;
        }
        let remove_i = remove_at(aux, i);
        let written_len = match kind {
            RelocKind::Align => {
                let n = (r.addend as u64).saturating_sub(remove_i);
                write_nop_sequence(&mut out, n);
                n
            }
            RelocKind::RvcJump | RelocKind::CheriRvcCjump => {
                if let Some(Write::Half(w)) = aux.writes[i] {
                    out.extend_from_slice(&w.to_le_bytes());
                }
                2
            }
            RelocKind::Jal | RelocKind::CheriCjal | RelocKind::CompartmentLoI | RelocKind::CompartmentLoS => {
                if let Some(Write::Word(w)) = aux.writes[i] {
                    out.extend_from_slice(&w.to_le_bytes());
                }
                4
            }
            RelocKind::Relax => 0,
            other => {
                return Err(internal(alloc::format!(
                    "unreachable relocation kind {other:?} in finalize"
                )))
            }
        };
        src_pos += remove_i + written_len;
    }

    if (src_pos as usize) < raw.len() {
        out.extend_from_slice(&raw[src_pos as usize..]);
    }

    let mut new_relocs = Vec::with_capacity(relocations.len());
    let mut j = 0;
    while j < relocations.len() {
        let offset = relocations[j].offset;
        let mut k = j;
        while k < relocations.len() && relocations[k].offset == offset {
            k += 1;
        }
        let delta_before = if j == 0 { 0 } else { aux.reloc_deltas[j - 1] };
        for idx in j..k {
            let mut rec = relocations[idx].clone();
            rec.offset -= delta_before;
            if aux.reloc_types[idx] != RelocKind::None {
                rec.kind = aux.reloc_types[idx];
            }
            new_relocs.push(rec);
        }
        j = k;
    }

    Ok((out, new_relocs))
}
