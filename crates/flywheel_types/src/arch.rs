/// Architectures a package universe can be built for. The list covers the
/// values RPM itself knows; `noarch` and `src` are valid package
/// architectures but not valid base architectures.
pub const ARCHES: &[&str] = &[
    "aarch64",
    "alpha",
    "arm",
    "armv5tel",
    "armv6hl",
    "armv6l",
    "armv7hl",
    "armv7hnl",
    "armv7l",
    "i386",
    "i486",
    "i586",
    "i686",
    "ia64",
    "loongarch64",
    "mips",
    "mips64",
    "mips64el",
    "mipsel",
    "ppc",
    "ppc64",
    "ppc64le",
    "ppc64p7",
    "riscv64",
    "s390",
    "s390x",
    "sh4",
    "sparc",
    "sparc64",
    "sparc64v",
    "sparcv9",
    "sparcv9v",
    "x86_64",
    "x86_64_v2",
    "x86_64_v3",
    "x86_64_v4",
];

/// Whether `arch` is a recognised base architecture.
pub fn is_valid_arch(arch: &str) -> bool {
    ARCHES.contains(&arch)
}

#[cfg(test)]
mod test {
    use super::is_valid_arch;

    #[test]
    fn test_is_valid_arch() {
        assert!(is_valid_arch("x86_64"));
        assert!(is_valid_arch("aarch64"));
        assert!(!is_valid_arch("noarch"));
        assert!(!is_valid_arch("magic"));
        assert!(!is_valid_arch(""));
    }
}
