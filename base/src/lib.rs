//! The `base` crate defines the machine-level things which are useful
//! in both the peripheral simulator and other associated tools.  The
//! idea is that if you want to write (say) a tape-preparation tool,
//! it would depend on the base crate but would not need to depend on
//! the simulator library itself.

mod types;

pub mod charset;
pub mod collections;
pub mod prelude;

pub use crate::types::*;

#[macro_export]
macro_rules! digit {
    ($n:expr) => {
        $crate::prelude::Digit::new::<{ $n }>()
    };
}

#[test]
fn test_digit_macro() {
    use prelude::Digit;
    let m: Digit = digit!(5);
    let n: Digit = Digit::try_from(5_u8).expect("test data should be in range");
    assert_eq!(m, n);

    let p: Digit = digit!(0o17);
    assert_eq!(p, Digit::END_OF_WORD);
}
