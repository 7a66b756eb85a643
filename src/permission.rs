use crate::error::{DfsUtilError, Result};

use std::fmt::{Display, Formatter};

const STICKY_BIT: u16 = 0o1000;
const PERMISSION_BITS: u16 = 0o777;

/// Unix style permission bits of a file or directory.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FsPermission {
    mode: u16,
}

impl FsPermission {
    pub fn new(mode: u16) -> Self {
        Self {
            mode: mode & (PERMISSION_BITS | STICKY_BIT),
        }
    }

    /// Parses an octal mode (`744`, `0755`, `1777`) or a symbolic one
    /// (`rwxr--r--`, optionally ending in `t`/`T` for the sticky bit).
    pub fn parse(mode: &str) -> Result<Self> {
        let mode = mode.trim();
        if !mode.is_empty() && mode.chars().all(|c| c.is_digit(8)) {
            return parse_octal(mode);
        }
        if mode.len() == 9 {
            return parse_symbolic(mode);
        }
        Err(invalid(mode))
    }

    pub fn dir_default() -> Self {
        Self::new(0o755)
    }

    pub fn file_default() -> Self {
        Self::new(0o644)
    }

    pub fn mode(&self) -> u16 {
        self.mode
    }

    pub fn sticky_bit(&self) -> bool {
        self.mode & STICKY_BIT != 0
    }
}

fn invalid(mode: &str) -> DfsUtilError {
    DfsUtilError::InvalidPermission(format!("'{}' is not a valid permission", mode))
}

fn parse_octal(mode: &str) -> Result<FsPermission> {
    if !(3..=4).contains(&mode.len()) {
        return Err(invalid(mode));
    }
    let value = u16::from_str_radix(mode, 8).map_err(|_| invalid(mode))?;
    if value & !(PERMISSION_BITS | STICKY_BIT) != 0 {
        return Err(invalid(mode));
    }
    Ok(FsPermission::new(value))
}

fn parse_symbolic(mode: &str) -> Result<FsPermission> {
    let mut value = 0;
    let mut sticky = false;
    for (i, c) in mode.chars().enumerate() {
        let expected = ['r', 'w', 'x'][i % 3];
        let bit = 1 << (8 - i);
        match c {
            '-' => (),
            c if c == expected => value |= bit,
            't' if i == 8 => {
                value |= bit;
                sticky = true;
            }
            'T' if i == 8 => sticky = true,
            _ => return Err(invalid(mode)),
        }
    }
    if sticky {
        value |= STICKY_BIT;
    }
    Ok(FsPermission::new(value))
}

impl Display for FsPermission {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let mut symbolic = String::with_capacity(9);
        for i in 0..9 {
            let bit = 1 << (8 - i);
            let c = if self.mode & bit != 0 {
                ['r', 'w', 'x'][i % 3]
            } else {
                '-'
            };
            symbolic.push(c);
        }
        if self.sticky_bit() {
            let other_execute = self.mode & 1 != 0;
            symbolic.pop();
            symbolic.push(if other_execute { 't' } else { 'T' });
        }
        write!(f, "{}", symbolic)
    }
}
