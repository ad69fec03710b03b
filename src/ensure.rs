#[cfg(test)]
use super::*;

#[macro_export]
macro_rules! ensure {
  ($cond:expr, $err:expr) => {
    if !($cond) {
      return Err($err);
    }
  };
  ($cond:expr, $fmt:expr, $($arg:tt)*) => {
    if !($cond) {
      return Err($fmt.to_string(), $($arg)*);
    }
  };
}
