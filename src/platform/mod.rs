#[cfg(unix)]
pub mod posix;

cfg_if::cfg_if! {
    if #[cfg(all(
        any(target_os = "illumos", target_os = "solaris"),
        target_pointer_width = "64"
    ))] {
        pub mod illumos;
        pub use self::illumos::*;
    }
}
