//! The Z80 condition-code register.
//!
//! [Flags] is a pure value type: every combinator returns a new value rather
//! than mutating `self`, so a whole instruction's flag effects can be built
//! up as a single expression and handed back to the register file.
use core::fmt;

bitflags! {
    /// The eight bits of the Z80 `F` register, including the undocumented
    /// bits 3 and 5.
    #[derive(Default)]
    pub struct Flags: u8 {
        const CARRY      = 0b0000_0001;
        const SUBTRACT   = 0b0000_0010;
        const PARITY     = 0b0000_0100;
        const FLAG3      = 0b0000_1000;
        const HALF_CARRY = 0b0001_0000;
        const FLAG5      = 0b0010_0000;
        const ZERO       = 0b0100_0000;
        const SIGN       = 0b1000_0000;
    }
}

impl Flags {
    /// `PARITY` is reused as the overflow flag by arithmetic instructions.
    pub const OVERFLOW: Flags = Flags::PARITY;

    #[inline] pub fn carry(self) -> bool { self.contains(Flags::CARRY) }
    #[inline] pub fn subtract(self) -> bool { self.contains(Flags::SUBTRACT) }
    #[inline] pub fn parity(self) -> bool { self.contains(Flags::PARITY) }
    #[inline] pub fn overflow(self) -> bool { self.contains(Flags::OVERFLOW) }
    #[inline] pub fn flag3(self) -> bool { self.contains(Flags::FLAG3) }
    #[inline] pub fn half_carry(self) -> bool { self.contains(Flags::HALF_CARRY) }
    #[inline] pub fn flag5(self) -> bool { self.contains(Flags::FLAG5) }
    #[inline] pub fn zero(self) -> bool { self.contains(Flags::ZERO) }
    #[inline] pub fn sign(self) -> bool { self.contains(Flags::SIGN) }

    /// Sets or clears `flag` in a copy of `self`, returning the result.
    #[inline]
    pub fn with(self, flag: Flags, set: bool) -> Flags {
        if set { self | flag } else { self - flag }
    }

    /// Sets the undocumented bits 3 and 5 from the corresponding bits of
    /// `source` (the documented "bus noise" byte for the instruction).
    #[inline]
    pub fn with_53_from(self, source: u8) -> Flags {
        (self - Flags::FLAG3 - Flags::FLAG5)
            | Flags::from_bits_truncate(source & (Flags::FLAG3.bits | Flags::FLAG5.bits))
    }

    /// Sets SIGN, ZERO and the undocumented 3/5 bits from `result`, all of
    /// which are sourced identically across almost every ALU routine.
    #[inline]
    pub fn with_sz53_from(self, result: u8) -> Flags {
        self.with(Flags::SIGN, result & 0x80 != 0)
            .with(Flags::ZERO, result == 0)
            .with_53_from(result)
    }

    /// Sets PARITY from the parity of `result` (even number of set bits).
    #[inline]
    pub fn with_parity_of(self, result: u8) -> Flags {
        self.with(Flags::PARITY, result.count_ones() % 2 == 0)
    }

    /// The classic "SZ5H3PNC" debug rendering, one character per bit from
    /// MSB to LSB, upper case when set and lower case (`.`-style) when clear.
    pub fn debug_string(self) -> String {
        const NAMES: [(Flags, char); 8] = [
            (Flags::SIGN, 'S'),
            (Flags::ZERO, 'Z'),
            (Flags::FLAG5, '5'),
            (Flags::HALF_CARRY, 'H'),
            (Flags::FLAG3, '3'),
            (Flags::PARITY, 'P'),
            (Flags::SUBTRACT, 'N'),
            (Flags::CARRY, 'C'),
        ];
        NAMES.iter().map(|&(f, c)| {
            if self.contains(f) { c } else { '.' }
        }).collect()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_raw_byte() {
        for byte in 0..=255u8 {
            assert_eq!(Flags::from_bits_truncate(byte).bits(), byte);
        }
    }

    #[test]
    fn with_sz53_sources_from_result_not_operands() {
        let f = Flags::empty().with_sz53_from(0x00);
        assert!(f.zero());
        assert!(!f.sign());
        let f = Flags::empty().with_sz53_from(0xA8);
        assert!(f.sign());
        assert!(f.flag5());
        assert!(f.flag3());
    }

    #[test]
    fn debug_string_matches_sz5h3pnc_layout() {
        assert_eq!((Flags::SIGN | Flags::CARRY).debug_string(), "S......C");
        assert_eq!(Flags::empty().debug_string(), "........");
        assert_eq!(Flags::all().debug_string(), "SZ5H3PNC");
    }

    #[test]
    fn combinators_are_pure() {
        let a = Flags::ZERO;
        let b = a.with(Flags::CARRY, true);
        assert_eq!(a, Flags::ZERO);
        assert_eq!(b, Flags::ZERO | Flags::CARRY);
    }
}
