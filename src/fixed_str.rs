//! NUL-padded strings of a fixed byte capacity, as used for the name, label
//! and consumer fields of the GPIO ABI.

use std::ops::Deref;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedStr<const N: usize> {
    s: [u8; N],
}

impl<const N: usize> FixedStr<N> {
    #[inline]
    pub const fn empty() -> Self {
        Self { s: [0; N] }
    }

    /// Copy `s` into a new fixed string, failing if it does not fit.
    pub fn new(s: &str) -> Result<Self, FixedStrErr> {
        if s.len() > N {
            return Err(FixedStrErr::CapacityOverflow {
                capacity: N,
                required: s.len(),
            });
        }
        if s.as_bytes().contains(&0) {
            return Err(FixedStrErr::InteriorNul);
        }

        let mut f = Self::empty();
        f.s[..s.len()].copy_from_slice(s.as_bytes());
        Ok(f)
    }

    /// Copy as much of `s` as fits while leaving room for the terminating
    /// NUL the kernel expects, never splitting a UTF-8 character.
    pub fn truncating(s: &str) -> Self {
        let s = s.split('\0').next().unwrap_or_default();
        let mut end = s.len().min(N.saturating_sub(1));
        while !s.is_char_boundary(end) {
            end -= 1;
        }

        let mut f = Self::empty();
        f.s[..end].copy_from_slice(&s.as_bytes()[..end]);
        f
    }

    /// Interpret a kernel supplied buffer, stopping at the first NUL.
    pub fn from_byte_array(mut bytes: [u8; N]) -> Result<Self, FixedStrErr> {
        let nul = find_nul(&bytes);
        let _ = core::str::from_utf8(&bytes[..nul])?;
        bytes[nul..].fill(0);

        Ok(FixedStr { s: bytes })
    }

    pub const fn into_byte_array(self) -> [u8; N] {
        self.s
    }

    #[inline]
    pub fn len(&self) -> usize {
        find_nul(&self.s)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        N == 0 || self.s[0] == 0
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        let s = &self.s[..self.len()];
        // Every constructor validates UTF-8 up to the first NUL.
        unsafe { std::str::from_utf8_unchecked(s) }
    }
}

impl<const N: usize> Default for FixedStr<N> {
    #[inline(always)]
    fn default() -> Self {
        Self::empty()
    }
}

impl<const N: usize> std::fmt::Debug for FixedStr<N> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FixedStr").field(&self.as_str()).finish()
    }
}

impl<const N: usize> std::fmt::Display for FixedStr<N> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

impl<const N: usize> AsRef<str> for FixedStr<N> {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<const N: usize> Deref for FixedStr<N> {
    type Target = str;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FixedStrErr {
    #[error(
        "Exceeded fixed string size: required {required} bytes with only {capacity} available"
    )]
    CapacityOverflow { capacity: usize, required: usize },
    #[error("String contains an interior NUL byte")]
    InteriorNul,
    #[error("UTF8 Error")]
    Utf8(#[from] core::str::Utf8Error),
}

impl From<FixedStrErr> for std::io::Error {
    fn from(value: FixedStrErr) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, value)
    }
}

#[inline]
fn find_nul(s: &[u8]) -> usize {
    s.iter().position(|c| *c == 0).unwrap_or(s.len())
}
