#[cfg(test)]
mod tests {
    use kodegen_bundler_pkg::bundler::{
        Arch, ArchitecturePolicy, DEFAULT_SEARCH_DEPTH, Error, InputArtifact, SettingsBuilder,
    };
    use std::path::Path;

    #[test]
    fn test_input_classification_by_extension() {
        assert!(matches!(
            InputArtifact::from_path("MyApp.app").unwrap(),
            InputArtifact::AppBundle(_)
        ));
        assert!(matches!(
            InputArtifact::from_path("MyApp.DMG").unwrap(),
            InputArtifact::DiskImage(_)
        ));
        assert!(matches!(
            InputArtifact::from_path("MyApp.zip").unwrap(),
            InputArtifact::ZipArchive(_)
        ));
        assert!(matches!(
            InputArtifact::from_path("MyApp.tbz").unwrap(),
            InputArtifact::TbzArchive(_)
        ));
    }

    #[test]
    fn test_unsupported_inputs() {
        for path in ["MyApp.pkg", "MyApp.tar.gz", "MyApp"] {
            assert!(matches!(
                InputArtifact::from_path(path),
                Err(Error::UnsupportedInput { .. })
            ));
        }
    }

    #[test]
    fn test_arch_spellings() {
        assert_eq!(Arch::Arm64.to_string(), "arm64");
        assert_eq!(Arch::X86_64.to_string(), "x86_64");
        assert_eq!(Arch::Universal.to_string(), "universal");
        assert_eq!(Arch::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_settings_defaults() {
        let settings = SettingsBuilder::new().build();
        assert_eq!(settings.architecture_policy(), ArchitecturePolicy::Strict);
        assert_eq!(settings.search_depth(), DEFAULT_SEARCH_DEPTH);
        assert_eq!(settings.tools().pkgbuild, Path::new("pkgbuild"));
        assert_eq!(settings.vendor().identifier_prefix, "com.adobe.");
        assert!(settings.vendor().install_target.is_none());
    }
}
