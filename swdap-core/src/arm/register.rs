// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Debug Register Access Traits
//!
//! These give registers a strongly typed address and value type.  The SWD
//! transfer engine uses the `ADDRESS` of the few registers it accesses on its
//! own behalf (RDBUFF and ABORT when flushing posted reads and clearing
//! errors, TAR and DRW when resetting the target).  Everything else a host
//! sends arrives as raw CMSIS-DAP transfer requests.

/// Base trait for all ARM debug register descriptors
pub trait RegisterDescriptor {
    const ADDRESS: u8;
    type Value;
}

/// Registers that can be read
pub trait ReadableRegister: RegisterDescriptor {
    /// Convert raw 32-bit data to register value
    fn from_raw(data: u32) -> Self::Value
    where
        Self::Value: From<u32>,
    {
        Self::Value::from(data)
    }
}

/// Registers that can be written
pub trait WritableRegister: RegisterDescriptor {
    /// Convert register value to raw 32-bit data
    fn to_raw(value: Self::Value) -> u32
    where
        Self::Value: Into<u32>,
    {
        value.into()
    }
}

/// Debug Port registers (accessed via DP operations)
pub trait DpRegister: RegisterDescriptor {
    /// The A[3:2] bits used in an SWD request to reach this register
    fn address_bits() -> u8 {
        Self::ADDRESS & 0x0C
    }
}

/// Access Port registers (accessed via AP operations)
pub trait ApRegister: RegisterDescriptor {
    /// The A[3:2] bits used in an SWD request to reach this register
    fn address_bits() -> u8 {
        Self::ADDRESS & 0x0C
    }
}

/// Generate a read-only register data type
#[macro_export]
macro_rules! register_data_r {
    ($name:ident) => {
        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value.0
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                $name(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:08X}", self.0)
            }
        }
    };
}

/// Generate a read-write register data type
#[macro_export]
macro_rules! register_data_rw {
    ($name:ident) => {
        $crate::register_data_r!($name);
    };
}

/// Generate a write-only register data type
#[macro_export]
macro_rules! register_data_w {
    ($name:ident) => {
        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:08X}", self.0)
            }
        }
    };
}
