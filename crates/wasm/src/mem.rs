use std::{collections::BTreeMap, rc::Rc};

use sym::{Expr, Sort, SortError};

/// Memory result type
pub type Result<T> = std::result::Result<T, Error>;

/// Possible memory errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The address could not be reduced to a constant.
    #[error("address is symbolic: {0}")]
    SymbolicAddress(String),

    /// Accesses are between 1 and 8 bytes.
    #[error("invalid access size of {0} bytes")]
    InvalidSize(u32),

    /// The accessed range extends past the end of the address space.
    #[error("access of {size} bytes at {address:#x} overflows the address space")]
    AddressOverflow { address: u64, size: u32 },

    /// Stored values must be bit-vectors spanning the full access size.
    #[error("cannot store {sort} as {size} bytes")]
    InvalidValue { sort: Sort, size: u32 },

    #[error(transparent)]
    Sort(#[from] SortError),
}

/// Initial memory contents from the module data segments.
#[derive(Debug, Clone, Default)]
pub struct DataSection {
    segments: BTreeMap<u64, Vec<u8>>,
}

impl DataSection {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a segment starting at `offset`. Where segments overlap, the one starting at the highest
    /// offset takes precedence.
    pub fn insert(&mut self, offset: u64, bytes: impl Into<Vec<u8>>) {
        self.segments.insert(offset, bytes.into());
    }

    pub fn byte(&self, address: u64) -> Option<u8> {
        self.segments
            .range(..=address)
            .rev()
            .find_map(|(&offset, bytes)| bytes.get(usize::try_from(address - offset).ok()?))
            .copied()
    }
}

/// Reduce an address expression to a constant.
pub fn concrete_address(address: &Expr) -> Result<u64> {
    address
        .as_bv()
        .ok_or_else(|| Error::SymbolicAddress(address.to_string()))
}

/// Byte addressable linear memory holding 8-bit symbolic values. Multi-byte values are stored
/// little-endian.
///
/// Bytes are shared between clones until one of them is written, so forking a state does not
/// copy memory that neither branch modifies.
#[derive(Debug, Clone, Default)]
pub struct SymbolicMemory {
    bytes: Rc<BTreeMap<u64, Expr>>,
}

impl SymbolicMemory {
    pub fn new() -> Self {
        Default::default()
    }

    fn check_range(address: u64, size: u32) -> Result<()> {
        if !(1..=8).contains(&size) {
            return Err(Error::InvalidSize(size));
        }

        address
            .checked_add(u64::from(size) - 1)
            .map(|_| ())
            .ok_or(Error::AddressOverflow { address, size })
    }

    /// Store a bit-vector of `8 * size` bits starting at `address`.
    pub fn store(&mut self, address: u64, size: u32, value: &Expr) -> Result<()> {
        Self::check_range(address, size)?;
        if value.sort() != Sort::BitVec(8 * size) {
            return Err(Error::InvalidValue {
                sort: value.sort(),
                size,
            });
        }

        let bytes = Rc::make_mut(&mut self.bytes);
        for i in 0..size {
            let byte = value.extract(8 * i + 7, 8 * i)?;
            bytes.insert(address + u64::from(i), byte);
        }

        Ok(())
    }

    /// Load `size` bytes starting at `address` as a single bit-vector. Bytes that were never
    /// written are read from the data section and are otherwise zero.
    pub fn load(&self, address: u64, size: u32, data: &DataSection) -> Result<Expr> {
        Self::check_range(address, size)?;
        let mut result: Option<Expr> = None;
        for i in 0..size {
            let address = address + u64::from(i);
            let byte = match self.bytes.get(&address) {
                Some(byte) => byte.clone(),
                None => Expr::bv(u64::from(data.byte(address).unwrap_or(0)), 8),
            };

            result = Some(match result {
                Some(low) => byte.concat(&low)?,
                None => byte,
            });
        }

        result.ok_or(Error::InvalidSize(size))
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns `true` if both memories still share the same storage.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.bytes, &other.bytes)
    }
}
