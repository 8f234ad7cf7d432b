//! Operation marks
//!
//! The low byte of an entry's state. Each data type numbers its own
//! operations from zero, so a mark is only meaningful next to its type.

macro_rules! marks {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn from_u16(value: u16) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl From<$name> for u16 {
            fn from(mark: $name) -> u16 {
                mark as u16
            }
        }
    };
}

marks! {
    /// String operations
    StrMark {
        Set = 0,
        Rem = 1,
        Expire = 2,
        Persist = 3,
    }
}

marks! {
    /// List operations
    ListMark {
        LPush = 0,
        RPush = 1,
        LPop = 2,
        RPop = 3,
        LRem = 4,
        LInsert = 5,
        LSet = 6,
        LTrim = 7,
        LClear = 8,
        LExpire = 9,
    }
}

marks! {
    /// Hash operations
    HashMark {
        HSet = 0,
        HDel = 1,
        HClear = 2,
        HExpire = 3,
    }
}

marks! {
    /// Set operations
    SetMark {
        SAdd = 0,
        SRem = 1,
        SMove = 2,
        SClear = 3,
        SExpire = 4,
    }
}

marks! {
    /// Sorted set operations
    ZSetMark {
        ZAdd = 0,
        ZRem = 1,
        ZClear = 2,
        ZExpire = 3,
    }
}
