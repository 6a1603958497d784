// Licensed under the Apache-2.0 license

#![cfg_attr(target_arch = "riscv32", no_std)]

use core::mem::{offset_of, size_of};

use mcu_error::{McuError, McuResult};
use zerocopy::{
    byteorder::{LittleEndian, U16, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

pub const BINDING_TAG_LEN: usize = 16;
pub const CTR_IV_LEN: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BindState {
    Unset = 0xff,
    InProgress = 0x7f,
    Bound = 0x01,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BindAlgorithm {
    Cmac = 0x01,
    Ccm = 0x02,
}

/// Binding bookkeeping stored next to the tag. Erased flash reads as
/// [`BindState::Unset`].
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct BindMeta {
    pub state: u8,
    pub algorithm: u8,
    pub nonce_len: u8,
    pub tag_len: u8,
}

impl BindMeta {
    pub const UNSET: BindMeta = BindMeta {
        state: BindState::Unset as u8,
        algorithm: 0xff,
        nonce_len: 0xff,
        tag_len: 0xff,
    };

    pub fn new(state: BindState, algorithm: BindAlgorithm, nonce_len: u8) -> Self {
        BindMeta {
            state: state as u8,
            algorithm: algorithm as u8,
            nonce_len,
            tag_len: BINDING_TAG_LEN as u8,
        }
    }

    /// Anything other than the two explicit markers counts as an
    /// interrupted bind.
    pub fn state(&self) -> BindState {
        match self.state {
            0xff => BindState::Unset,
            0x01 => BindState::Bound,
            _ => BindState::InProgress,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ImageHeader {
    pub binding_tag: [u8; BINDING_TAG_LEN],
    pub ctr_iv: [u8; CTR_IV_LEN],
    pub bind_meta: BindMeta,
}

impl ImageHeader {
    /// Header of a freshly provisioned, unbound image.
    pub fn new(ctr_iv: [u8; CTR_IV_LEN]) -> Self {
        ImageHeader {
            binding_tag: [0; BINDING_TAG_LEN],
            ctr_iv,
            bind_meta: BindMeta::UNSET,
        }
    }
}

pub const IMAGE_HEADER_SIZE: usize = size_of::<ImageHeader>();
pub const BINDING_TAG_OFFSET: usize = offset_of!(ImageHeader, binding_tag);
pub const BIND_META_OFFSET: usize = offset_of!(ImageHeader, bind_meta);

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ImageVersion {
    pub major: u8,
    pub minor: u8,
    pub revision: U16<LittleEndian>,
    pub build_num: U32<LittleEndian>,
}

/// Fixed fields at the start of the protected region, followed by the
/// payload.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ProtectedValues {
    pub security_counter: U32<LittleEndian>,
    pub version: ImageVersion,
}

impl ProtectedValues {
    pub fn new(security_counter: u32, version: ImageVersion) -> Self {
        ProtectedValues {
            security_counter: security_counter.into(),
            version,
        }
    }
}

/// In-memory copy of an image: header followed by the protected region.
pub struct BootImage<'a> {
    image_id: u32,
    header: &'a mut ImageHeader,
    protected: &'a mut [u8],
}

impl<'a> BootImage<'a> {
    /// Views `buf` as an image. Everything after the header is the
    /// protected region.
    pub fn new(image_id: u32, buf: &'a mut [u8]) -> McuResult<Self> {
        let (header, protected) =
            ImageHeader::mut_from_prefix(buf).map_err(|_| McuError::IMAGE_LAYOUT_INVALID)?;
        if protected.len() < size_of::<ProtectedValues>() {
            return Err(McuError::IMAGE_LAYOUT_INVALID);
        }
        Ok(BootImage {
            image_id,
            header,
            protected,
        })
    }

    pub fn image_id(&self) -> u32 {
        self.image_id
    }

    pub fn set_image_id(&mut self, image_id: u32) {
        self.image_id = image_id;
    }

    pub fn header(&self) -> &ImageHeader {
        &*self.header
    }

    pub fn header_mut(&mut self) -> &mut ImageHeader {
        &mut *self.header
    }

    pub fn protected(&self) -> &[u8] {
        &*self.protected
    }

    pub fn protected_mut(&mut self) -> &mut [u8] {
        &mut *self.protected
    }

    pub fn protected_values(&self) -> McuResult<&ProtectedValues> {
        ProtectedValues::ref_from_prefix(&*self.protected)
            .map(|(values, _)| values)
            .map_err(|_| McuError::IMAGE_LAYOUT_INVALID)
    }

    pub fn security_counter(&self) -> McuResult<u32> {
        Ok(self.protected_values()?.security_counter.get())
    }

    pub fn payload(&self) -> &[u8] {
        &self.protected[size_of::<ProtectedValues>()..]
    }
}
