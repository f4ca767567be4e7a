//! CLI Exit Code Registry
//!
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                         |
//! |------|-------------------------------------------------|
//! | 0    | Success                                         |
//! | 1    | General error (store, I/O, unfinished feature)  |
//! | 2    | Usage error (bad arguments, bad address)        |
//! | 3    | Edit refused by sheet policy                    |
//! | 4    | Sheet or cell not found                         |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - store, file or engine failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, malformed address.
pub const EXIT_USAGE: u8 = 2;

/// The edit was well-formed but the sheet refused it (header protected,
/// minimum size, sheet kind, stale cell).
pub const EXIT_REJECTED: u8 = 3;

/// No sheet matches the key, or the address is off the grid.
pub const EXIT_NOT_FOUND: u8 = 4;
