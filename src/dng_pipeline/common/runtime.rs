//! Process-wide state initialized once and shared by every conversion.

use std::sync::OnceLock;

use tracing::debug;

/// Linear 16-bit value to 8-bit sRGB-encoded value.
pub struct SrgbTable {
    table: Box<[u8]>,
}

impl SrgbTable {
    fn build() -> Self {
        let table = (0..=u16::MAX as u32)
            .map(|v| {
                let linear = v as f32 / u16::MAX as f32;
                let encoded = if linear <= 0.003_130_8 {
                    linear * 12.92
                } else {
                    1.055 * linear.powf(1.0 / 2.4) - 0.055
                };
                (encoded * 255.0).round().clamp(0.0, 255.0) as u8
            })
            .collect::<Vec<u8>>()
            .into_boxed_slice();
        Self { table }
    }

    #[inline]
    pub fn encode(&self, linear: u16) -> u8 {
        self.table[linear as usize]
    }
}

static SRGB_TABLE: OnceLock<SrgbTable> = OnceLock::new();

/// Builds the shared tables if no conversion has done so yet.
pub fn initialize() {
    let _ = srgb_table();
}

pub fn srgb_table() -> &'static SrgbTable {
    SRGB_TABLE.get_or_init(|| {
        debug!("Building sRGB encoding table");
        SrgbTable::build()
    })
}
