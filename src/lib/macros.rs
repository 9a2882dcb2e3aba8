/// `write!` into a `String`, which cannot fail
#[macro_export]
macro_rules! append {
    ($dst:expr, $($arg:tt)*) => (write!($dst, $($arg)*).unwrap());
    ($dst:expr, $arg:expr) => (write!($dst, "{}", $arg).unwrap());
}

/// `append!` followed by a newline
#[macro_export]
macro_rules! appendln {
    ($dst:expr) => (append!($dst, "\n"));
    ($dst:expr, $($arg:tt)*) => {{
        append!($dst, $($arg)*);
        append!($dst, "\n");
    }};
}
