//! Walking `source()` chains.
//!
//! Identity is by address: an error "is" a target when the target is the
//! very same value somewhere in its chain. [`JoinedError`] fans out, so every
//! constituent of a join is searched.

use std::error::Error as StdError;

use crate::group::JoinedError;

/// Returns `true` if `a` and `b` are the same error value.
///
/// A wrapper that stores its source at offset 0 shares that source's
/// address, so the size and the number of sources nested at the address
/// must match as well.
pub fn same(a: &(dyn StdError + 'static), b: &(dyn StdError + 'static)) -> bool {
    address(a) == address(b)
        && std::mem::size_of_val(a) == std::mem::size_of_val(b)
        && nested_at_address(a) == nested_at_address(b)
}

fn address(err: &(dyn StdError + 'static)) -> *const () {
    err as *const dyn StdError as *const ()
}

/// How many successive sources of `err` live at `err`'s own address.
fn nested_at_address(err: &(dyn StdError + 'static)) -> usize {
    let addr = address(err);
    let mut depth = 0;
    let mut current = err.source();
    while let Some(e) = current.filter(|e| address(*e) == addr) {
        depth += 1;
        current = e.source();
    }
    depth
}

/// Returns `true` if `target` appears in `err`'s chain, `err` included.
pub fn is(err: &(dyn StdError + 'static), target: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if same(e, target) {
            return true;
        }
        if let Some(joined) = e.downcast_ref::<JoinedError>() {
            return joined.errors().iter().any(|c| is(&**c, target));
        }
        current = e.source();
    }
    false
}

/// First error of type `T` in `err`'s chain, `err` included.
pub fn find<'a, T: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a T> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        if let Some(joined) = e.downcast_ref::<JoinedError>() {
            return joined.errors().iter().find_map(|c| find::<T>(&**c));
        }
        current = e.source();
    }
    None
}
