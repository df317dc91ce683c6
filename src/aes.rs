//! Inline AES configuration for ciphered page streams
//!
//! The CDMA engine can route a transfer through an AES-128 context whose
//! per-segment IV is derived from the page being moved. Two fixed keys
//! cover the two on-flash regions: pages inside the FTL's data window use
//! the FTL key with IVs chained from the logical page number, everything
//! else uses the VFL key with IVs chained from the physical page number.

/// AES key of the FTL data region
pub(crate) static FTL_KEY: [u32; 4] = [0x95AE5DF6, 0x426C900E, 0x58CC54B2, 0xCEEE78FC];

/// AES key of the VFL metadata region
pub(crate) static VFL_KEY: [u32; 4] = [0xAB42A792, 0xBF69C908, 0x12946C00, 0xA579CCD3];

/// Cipher selection for the inline engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AesType {
    /// AES with a 128-bit key
    Aes128,
}

/// Per-segment IV source of a descriptor
#[derive(Clone, Copy, Debug)]
enum IvSource<'a> {
    /// FTL region: IVs chain from the logical page the buffer offset
    /// falls on
    FtlOffset {
        offset: u32,
        databuf: u32,
        bytes_per_page: u32,
        start_page: u32,
    },
    /// VFL region: IVs chain from the physical page of each segment
    VflPages { pages: &'a [u32] },
    /// VFL region with externally supplied IVs, 16 bytes per segment
    VflExplicit { ivs: &'a [u8] },
}

/// One inline AES configuration, rebuilt for every ciphered read
#[derive(Clone, Copy, Debug)]
pub struct AesDescriptor<'a> {
    /// Bytes ciphered per segment
    pub data_size: u32,
    /// Key schedule input
    pub key: &'static [u32; 4],
    /// Run the inverse cipher (reads decrypt)
    pub decrypt: bool,
    /// Cipher selection
    pub kind: AesType,
    iv: IvSource<'a>,
}

impl<'a> AesDescriptor<'a> {
    /// Descriptor for a transfer into the FTL data window
    pub(crate) fn ftl(
        bytes_per_page: u32,
        offset: u32,
        databuf: u32,
        start_page: u32,
        decrypt: bool,
    ) -> Self {
        AesDescriptor {
            data_size: bytes_per_page,
            key: &FTL_KEY,
            decrypt,
            kind: AesType::Aes128,
            iv: IvSource::FtlOffset {
                offset,
                databuf,
                bytes_per_page,
                start_page,
            },
        }
    }

    /// Descriptor for a VFL-region transfer of `pages`
    pub(crate) fn vfl(bytes_per_page: u32, pages: &'a [u32], decrypt: bool) -> Self {
        AesDescriptor {
            data_size: bytes_per_page,
            key: &VFL_KEY,
            decrypt,
            kind: AesType::Aes128,
            iv: IvSource::VflPages { pages },
        }
    }

    /// VFL-region descriptor with externally supplied IV material
    #[allow(dead_code)]
    pub(crate) fn vfl_with_ivs(bytes_per_page: u32, ivs: &'a [u8], decrypt: bool) -> Self {
        AesDescriptor {
            data_size: bytes_per_page,
            key: &VFL_KEY,
            decrypt,
            kind: AesType::Aes128,
            iv: IvSource::VflExplicit { ivs },
        }
    }

    /// Generates the IV of one transfer segment
    pub fn iv_for_segment(&self, segment: usize, iv: &mut [u32; 4]) {
        match self.iv {
            IvSource::FtlOffset {
                offset,
                databuf,
                bytes_per_page,
                start_page,
            } => {
                let page = (offset - databuf) / bytes_per_page + start_page;
                chain_iv(page, iv);
            }
            IvSource::VflPages { pages } => chain_iv(pages[segment], iv),
            IvSource::VflExplicit { ivs } => {
                let chunk = &ivs[segment * 16..segment * 16 + 16];
                for (word, bytes) in iv.iter_mut().zip(chunk.chunks_exact(4)) {
                    *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
            }
        }
    }
}

/// The LFSR step chaining a page number into four IV words
fn chain_iv(page: u32, iv: &mut [u32; 4]) {
    let mut val = page;
    for word in iv.iter_mut() {
        val = if val & 1 != 0 {
            (val >> 1) ^ 0x80000061
        } else {
            val >> 1
        };
        *word = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iv_chain_steps() {
        let mut iv = [0u32; 4];
        chain_iv(2, &mut iv);
        assert_eq!(iv, [1, 0x80000061, 0xC0000051, 0xE0000049]);
    }

    #[test]
    fn ftl_iv_tracks_buffer_offset() {
        // A buffer k pages into the FTL window ciphers like logical page
        // start_page + k.
        let bytes_per_page = 0x1000;
        let databuf = 0x4000_0000;
        let start_page = 0x120;

        for k in 0..4u32 {
            let desc = AesDescriptor::ftl(
                bytes_per_page,
                databuf + k * bytes_per_page,
                databuf,
                start_page,
                true,
            );

            let mut from_offset = [0u32; 4];
            desc.iv_for_segment(0, &mut from_offset);

            let mut reference = [0u32; 4];
            chain_iv(start_page + k, &mut reference);

            assert_eq!(from_offset, reference);
        }
    }

    #[test]
    fn explicit_ivs_copy_through() {
        let mut raw = [0u8; 32];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = i as u8;
        }
        let desc = AesDescriptor::vfl_with_ivs(0x1000, &raw, true);

        let mut iv = [0u32; 4];
        desc.iv_for_segment(1, &mut iv);
        assert_eq!(iv, [0x13121110, 0x17161514, 0x1B1A1918, 0x1F1E1D1C]);
    }
}
