//! Build script for novamix-pipewire.
//!
//! Probes for libpipewire so a missing dev package surfaces at build
//! time instead of at link time.

fn main() {
    if let Err(e) = pkg_config::probe_library("libpipewire-0.3") {
        eprintln!("Warning: libpipewire-0.3 not found: {e}");
        eprintln!("Install pipewire-devel (Fedora) or libpipewire-0.3-dev (Debian/Ubuntu)");
        // The crate still compiles without it; only linking needs the library.
    }
}
