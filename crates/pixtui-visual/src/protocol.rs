#![forbid(unsafe_code)]

//! Terminal bitmap protocols.
//!
//! A [`BitmapProtocol`] knows how a terminal stores sprixel pixels and how a
//! single cell is wiped from, and rebuilt into, a staged payload.
//!
//! - **Kitty** keeps images terminal-side; a wipe zeroes the cell's alphas and
//!   saves them, and a changed bitmap is retransmitted under a fresh id.
//! - **Sixel** paints pixels into the cell grid and is redrawn in place; a
//!   partial-cell wipe is not expressible in the payload.

use std::io::{self, Write};

use pixtui_core::geometry::CellPixels;
use pixtui_core::terminal_capabilities::PixelProtocol;

use crate::error::ProtocolError;
use crate::sprixel::Bitmap;
use crate::tam::CellState;

/// Delete every image the terminal holds.
const KITTY_DELETE_ALL: &[u8] = b"\x1b_Ga=d\x1b\\";

/// Protocol-specific sprixel operations.
pub trait BitmapProtocol: Send {
    /// Protocol implemented.
    fn kind(&self) -> PixelProtocol;

    /// True when a sprixel can be redrawn in place rather than replaced.
    fn updates_in_place(&self) -> bool;

    /// Aux data recorded when a transparent cell is annihilated.
    fn transparent_aux(&self, cp: CellPixels) -> Box<[u8]>;

    /// Remove cell `(y, x)` from the payload, returning what restoring needs.
    fn wipe_cell(
        &self,
        bitmap: &mut Bitmap,
        cp: CellPixels,
        y: u32,
        x: u32,
    ) -> Result<Box<[u8]>, ProtocolError>;

    /// Rebuild cell `(y, x)` from `aux`, returning its reclassified state.
    fn rebuild_cell(
        &self,
        bitmap: &mut Bitmap,
        cp: CellPixels,
        y: u32,
        x: u32,
        aux: &[u8],
    ) -> Result<CellState, ProtocolError>;

    /// Write the sequence that erases every bitmap.
    fn clear_all(&self, out: &mut dyn Write) -> io::Result<()>;

    /// Release terminal-side state at shutdown.
    fn shutdown(&self, out: &mut dyn Write) -> io::Result<()> {
        self.clear_all(out)
    }
}

/// Kitty graphics protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct KittyProtocol;

impl BitmapProtocol for KittyProtocol {
    fn kind(&self) -> PixelProtocol {
        PixelProtocol::Kitty
    }

    fn updates_in_place(&self) -> bool {
        false
    }

    fn transparent_aux(&self, cp: CellPixels) -> Box<[u8]> {
        vec![0; cp.area()].into_boxed_slice()
    }

    fn wipe_cell(
        &self,
        bitmap: &mut Bitmap,
        cp: CellPixels,
        y: u32,
        x: u32,
    ) -> Result<Box<[u8]>, ProtocolError> {
        bitmap.check_len()?;
        let mut saved = vec![0; cp.area()];
        for (i, slot) in saved.iter_mut().enumerate() {
            if let Some(o) = bitmap.alpha_offset(cp, y, x, i) {
                let payload = bitmap.payload_mut();
                *slot = payload[o];
                payload[o] = 0;
            }
        }
        Ok(saved.into_boxed_slice())
    }

    fn rebuild_cell(
        &self,
        bitmap: &mut Bitmap,
        cp: CellPixels,
        y: u32,
        x: u32,
        aux: &[u8],
    ) -> Result<CellState, ProtocolError> {
        bitmap.check_len()?;
        if aux.len() < cp.area() {
            return Err(ProtocolError::PayloadTooShort {
                needed: cp.area(),
                len: aux.len(),
            });
        }
        for (i, &a) in aux.iter().take(cp.area()).enumerate() {
            if let Some(o) = bitmap.alpha_offset(cp, y, x, i) {
                bitmap.payload_mut()[o] = a;
            }
        }
        Ok(bitmap.cell_state(cp, y, x))
    }

    fn clear_all(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(KITTY_DELETE_ALL)
    }
}

/// Sixel graphics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SixelProtocol;

impl BitmapProtocol for SixelProtocol {
    fn kind(&self) -> PixelProtocol {
        PixelProtocol::Sixel
    }

    fn updates_in_place(&self) -> bool {
        true
    }

    fn transparent_aux(&self, cp: CellPixels) -> Box<[u8]> {
        vec![0; cp.area()].into_boxed_slice()
    }

    fn wipe_cell(
        &self,
        _bitmap: &mut Bitmap,
        _cp: CellPixels,
        _y: u32,
        _x: u32,
    ) -> Result<Box<[u8]>, ProtocolError> {
        Err(ProtocolError::Unsupported("cell wipes"))
    }

    /// The payload was never modified, so the cell is reclassified from it.
    fn rebuild_cell(
        &self,
        bitmap: &mut Bitmap,
        cp: CellPixels,
        y: u32,
        x: u32,
        _aux: &[u8],
    ) -> Result<CellState, ProtocolError> {
        bitmap.check_len()?;
        Ok(bitmap.cell_state(cp, y, x))
    }

    // Sixels are overwritten by text; there is nothing to delete.
    fn clear_all(&self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

/// Protocol implementation for `kind`, if it has one.
pub fn for_protocol(kind: PixelProtocol) -> Option<Box<dyn BitmapProtocol>> {
    match kind {
        PixelProtocol::Kitty => Some(Box::new(KittyProtocol)),
        PixelProtocol::Sixel => Some(Box::new(SixelProtocol)),
        PixelProtocol::None => None,
    }
}
