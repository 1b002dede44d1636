//! Common type definitions shared across the tern runtime.

use core::fmt;

use num_enum::TryFromPrimitive;

// =============================================================================
// Kind
// =============================================================================

/// Kind - the runtime classification of a source-language type.
///
/// Layout:
/// - Primitives (1-16): scalars and strings, copied by value
/// - Composite value types (17, 25): copied field-by-field on assignment
/// - Reference types (18-24, 26): shared on assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum Kind {
    Invalid = 0,

    // === Primitive Types ===
    Bool = 1,
    Int = 2,
    Int8 = 3,
    Int16 = 4,
    Int32 = 5,
    Int64 = 6,
    Uint = 7,
    Uint8 = 8,
    Uint16 = 9,
    Uint32 = 10,
    Uint64 = 11,
    Uintptr = 12,
    Float32 = 13,
    Float64 = 14,
    Complex64 = 15,
    Complex128 = 16,

    // === Composite / Reference Types ===
    Array = 17,
    Chan = 18,
    Func = 19,
    Interface = 20,
    Map = 21,
    Pointer = 22,
    Slice = 23,
    String = 24,
    Struct = 25,
    UnsafePointer = 26,
}

impl Kind {
    /// Kinds that have a predeclared type of the same name.
    pub const BASIC: [Kind; 18] = [
        Self::Bool, Self::Int, Self::Int8, Self::Int16, Self::Int32, Self::Int64,
        Self::Uint, Self::Uint8, Self::Uint16, Self::Uint32, Self::Uint64, Self::Uintptr,
        Self::Float32, Self::Float64, Self::Complex64, Self::Complex128,
        Self::String, Self::UnsafePointer,
    ];

    #[inline]
    pub fn from_u8(v: u8) -> Self {
        Self::try_from(v).unwrap_or(Kind::Invalid)
    }

    pub fn is_signed_int(&self) -> bool {
        matches!(self, Self::Int | Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub fn is_unsigned_int(&self) -> bool {
        matches!(
            self,
            Self::Uint | Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64 | Self::Uintptr
        )
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    /// Returns true if assignment must copy the value (struct and array kinds).
    #[inline]
    pub fn is_value_type(&self) -> bool {
        matches!(self, Self::Struct | Self::Array)
    }

    /// Returns true for kinds whose zero value is nil.
    #[inline]
    pub fn is_nillable(&self) -> bool {
        matches!(
            self,
            Self::Chan | Self::Func | Self::Interface | Self::Map | Self::Pointer | Self::Slice
                | Self::UnsafePointer
        )
    }

    /// Bit width of sized numeric kinds. `Int`, `Uint` and `Uintptr` are 64-bit.
    pub fn bits(&self) -> Option<u32> {
        match self {
            Self::Int8 | Self::Uint8 => Some(8),
            Self::Int16 | Self::Uint16 => Some(16),
            Self::Int32 | Self::Uint32 | Self::Float32 => Some(32),
            Self::Int | Self::Int64 | Self::Uint | Self::Uint64 | Self::Uintptr | Self::Float64
            | Self::Complex64 => Some(64),
            Self::Complex128 => Some(128),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Uintptr => "uintptr",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
            Self::Array => "array",
            Self::Chan => "chan",
            Self::Func => "func",
            Self::Interface => "interface",
            Self::Map => "map",
            Self::Pointer => "ptr",
            Self::Slice => "slice",
            Self::String => "string",
            Self::Struct => "struct",
            Self::UnsafePointer => "unsafe.Pointer",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Channel direction
// =============================================================================

/// Channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive)]
#[repr(u8)]
pub enum ChanDir {
    /// Bidirectional: chan T
    #[default]
    Both = 0,
    /// Send-only: chan<- T
    Send = 1,
    /// Receive-only: <-chan T
    Recv = 2,
}

impl ChanDir {
    #[inline]
    pub fn can_send(self) -> bool {
        matches!(self, ChanDir::Both | ChanDir::Send)
    }

    #[inline]
    pub fn can_recv(self) -> bool {
        matches!(self, ChanDir::Both | ChanDir::Recv)
    }

    /// Type-string prefix for a channel of this direction.
    pub fn prefix(self) -> &'static str {
        match self {
            ChanDir::Both => "chan ",
            ChanDir::Send => "chan<- ",
            ChanDir::Recv => "<-chan ",
        }
    }
}

impl fmt::Display for ChanDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChanDir::Both => "chan",
            ChanDir::Send => "chan<-",
            ChanDir::Recv => "<-chan",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip_u8() {
        for kind in Kind::BASIC {
            assert_eq!(Kind::from_u8(kind as u8), kind);
        }
        assert_eq!(Kind::from_u8(200), Kind::Invalid);
    }

    #[test]
    fn test_kind_classes() {
        assert!(Kind::Int8.is_signed_int());
        assert!(Kind::Uintptr.is_unsigned_int());
        assert!(Kind::Struct.is_value_type());
        assert!(!Kind::Slice.is_value_type());
        assert!(Kind::Map.is_nillable());
        assert_eq!(Kind::Pointer.to_string(), "ptr");
    }

    #[test]
    fn test_chan_dir() {
        assert!(ChanDir::Both.can_send() && ChanDir::Both.can_recv());
        assert!(!ChanDir::Recv.can_send());
        assert!(!ChanDir::Send.can_recv());
        assert_eq!(ChanDir::Send.to_string(), "chan<-");
    }
}
