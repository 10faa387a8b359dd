//! Scripted stand-ins for the macOS packaging tools.
//!
//! Archives are directories named `*.zip` / `*.tbz` whose contents are the
//! "extracted" tree. Disk images are text files: a `mount:<dir>` line names
//! the directory the fake attach reports as the mount point, and an `SLA`
//! line marks the image as licence-gated.

#![allow(dead_code)]

use kodegen_bundler_pkg::bundler::{
    ArchitecturePolicy, Result, Settings, SettingsBuilder, ToolCommand, ToolOutput, ToolRunner,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

/// What a fake `pkgbuild` saw when building a component.
#[derive(Clone, Debug)]
pub struct ComponentBuild {
    pub identifier: String,
    pub version: String,
    /// Files under the root, relative to it, sorted.
    pub files: Vec<String>,
    /// `scripts/postinstall`, when `--scripts` was passed.
    pub postinstall: Option<String>,
    /// Component plist contents at build time.
    pub component_plist: String,
}

#[derive(Debug, Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<ToolCommand>>,
    builds: Mutex<Vec<ComponentBuild>>,
    fail_on: Option<(String, String)>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `program` exit 1 whenever its first argument is `first_arg`.
    pub fn failing(program: &str, first_arg: &str) -> Self {
        Self {
            fail_on: Some((program.to_string(), first_arg.to_string())),
            ..Self::default()
        }
    }

    /// Every invocation, rendered as `program arg arg...`.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| {
                let mut line = c.program_name();
                for arg in c.arguments_lossy() {
                    line.push(' ');
                    line.push_str(&arg);
                }
                line
            })
            .collect()
    }

    /// Invocations of `program` whose first argument is `first_arg`.
    pub fn count(&self, program: &str, first_arg: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                c.program_name() == program
                    && c.arguments_lossy().first().map(String::as_str) == Some(first_arg)
            })
            .count()
    }

    pub fn component_builds(&self) -> Vec<ComponentBuild> {
        self.builds.lock().unwrap().clone()
    }

    fn dispatch(&self, program: &str, args: &[String]) -> ToolOutput {
        let first = args.first().map(String::as_str).unwrap_or_default();
        if let Some((p, a)) = &self.fail_on
            && p == program
            && a == first
        {
            return ToolOutput::failure(1, format!("{program}: simulated failure"));
        }

        match (program, first) {
            ("file", _) => match fs::read_to_string(&args[0]) {
                Ok(description) => ToolOutput::success(format!("{description}\n")),
                Err(_) => ToolOutput::failure(1, "cannot open"),
            },
            ("ditto", "-x") => extract(&args[2], &args[3]),
            ("tar", "-xjf") => extract(&args[1], &args[3]),
            ("hdiutil", "imageinfo") => {
                let gated = image_text(&args[2]).lines().any(|l| l == "SLA");
                ToolOutput::success(imageinfo_plist(gated))
            }
            ("hdiutil", "convert") => {
                let text = image_text(&args[1]);
                let mut kept: Vec<&str> = text.lines().filter(|l| *l != "SLA").collect();
                kept.push("converted");
                match fs::write(&args[5], kept.join("\n")) {
                    Ok(()) => ToolOutput::success("created"),
                    Err(e) => ToolOutput::failure(1, e.to_string()),
                }
            }
            ("hdiutil", "attach") => {
                let image = args.last().cloned().unwrap_or_default();
                match image_text(&image)
                    .lines()
                    .find_map(|l| l.strip_prefix("mount:"))
                {
                    Some(mount) => ToolOutput::success(attach_plist(mount)),
                    None => ToolOutput::failure(1, "attach failed: not recognized"),
                }
            }
            ("hdiutil", "detach") => ToolOutput::success("\"disk4\" ejected."),
            ("pkgbuild", "--analyze") => {
                let plist = args.last().cloned().unwrap_or_default();
                match fs::write(&plist, ANALYZED_PLIST) {
                    Ok(()) => ToolOutput::success(""),
                    Err(e) => ToolOutput::failure(1, e.to_string()),
                }
            }
            ("pkgbuild", "--root") => self.build_component(args),
            ("productbuild", "--synthesize") => {
                let component = PathBuf::from(&args[2]);
                let output = &args[3];
                let recorded = fs::read_to_string(&component).unwrap_or_default();
                let (identifier, version) = recorded.split_once(' ').unwrap_or(("", ""));
                let file_name = component
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let xml = SYNTHESIZED_TEMPLATE
                    .replace("IDENTIFIER", identifier)
                    .replace("VERSION", version.trim())
                    .replace("COMPONENT", &file_name);
                match fs::write(output, xml) {
                    Ok(()) => ToolOutput::success(""),
                    Err(e) => ToolOutput::failure(1, e.to_string()),
                }
            }
            ("productbuild", "--distribution") => {
                // The "product archive" is the distribution itself, so
                // inspection can read it back.
                match fs::copy(&args[1], &args[4]) {
                    Ok(_) => ToolOutput::success("productbuild: Wrote product"),
                    Err(e) => ToolOutput::failure(1, e.to_string()),
                }
            }
            ("pkgutil", "--expand") => {
                let expanded = Path::new(&args[2]);
                let copied = fs::create_dir_all(expanded)
                    .and_then(|()| fs::copy(&args[1], expanded.join("Distribution")));
                match copied {
                    Ok(_) => ToolOutput::success(""),
                    Err(e) => ToolOutput::failure(1, e.to_string()),
                }
            }
            ("spctl", "--assess") => ToolOutput {
                code: Some(3),
                stdout: String::new(),
                stderr: format!("{}: rejected\nsource=no usable signature\n", args[4]),
            },
            _ => ToolOutput::failure(127, format!("{program}: unexpected invocation")),
        }
    }

    fn build_component(&self, args: &[String]) -> ToolOutput {
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
                .unwrap_or_default()
        };
        let root = PathBuf::from(value_of("--root"));
        let identifier = value_of("--identifier");
        let version = value_of("--version");
        let output = args.last().cloned().unwrap_or_default();

        let postinstall = args
            .iter()
            .position(|a| a == "--scripts")
            .and_then(|i| args.get(i + 1))
            .and_then(|scripts| fs::read_to_string(Path::new(scripts).join("postinstall")).ok());

        self.builds.lock().unwrap().push(ComponentBuild {
            identifier: identifier.clone(),
            version: version.clone(),
            files: relative_files(&root),
            postinstall,
            component_plist: fs::read_to_string(value_of("--component-plist")).unwrap_or_default(),
        });

        match fs::write(&output, format!("{identifier} {version}")) {
            Ok(()) => ToolOutput::success(format!("pkgbuild: Wrote package to {output}")),
            Err(e) => ToolOutput::failure(1, e.to_string()),
        }
    }
}

impl ToolRunner for FakeRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(command.clone());
        Ok(self.dispatch(&command.program_name(), &command.arguments_lossy()))
    }
}

const ANALYZED_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<array>
	<dict>
		<key>BundleIsRelocatable</key>
		<true/>
		<key>RootRelativeBundlePath</key>
		<string>Applications/MyApp.app</string>
	</dict>
</array>
</plist>
"#;

const SYNTHESIZED_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<installer-gui-script minSpecVersion="2">
    <pkg-ref id="IDENTIFIER"/>
    <options customize="never" require-scripts="false"/>
    <choices-outline>
        <line choice="default">
            <line choice="IDENTIFIER"/>
        </line>
    </choices-outline>
    <choice id="default"/>
    <choice id="IDENTIFIER" visible="false">
        <pkg-ref id="IDENTIFIER"/>
    </choice>
    <pkg-ref id="IDENTIFIER" version="VERSION" onConclusion="none">COMPONENT</pkg-ref>
</installer-gui-script>
"#;

fn imageinfo_plist(gated: bool) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict>
<key>Format</key><string>UDZO</string>
<key>Properties</key><dict>
<key>Software License Agreement</key>{}
</dict></dict></plist>"#,
        if gated { "<true/>" } else { "<false/>" }
    )
}

fn attach_plist(mount: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict>
<key>system-entities</key><array>
<dict><key>dev-entry</key><string>/dev/disk4</string></dict>
<dict><key>dev-entry</key><string>/dev/disk4s1</string><key>mount-point</key><string>{mount}</string></dict>
</array></dict></plist>"#
    )
}

fn image_text(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

fn extract(archive: &str, dest: &str) -> ToolOutput {
    match copy_tree(Path::new(archive), Path::new(dest)) {
        Ok(()) => ToolOutput::success(""),
        Err(e) => ToolOutput::failure(1, e.to_string()),
    }
}

fn copy_tree(src: &Path, dest: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        let target = dest.join(entry.path().strip_prefix(src).map_err(std::io::Error::other)?);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn relative_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().into_owned())
        })
        .collect();
    files.sort();
    files
}

/// Writes `<dir>/<bundle>` with an `Info.plist` and a main executable whose
/// contents are what the fake `file` reports.
pub fn write_app(
    dir: &Path,
    bundle: &str,
    name: &str,
    identifier: &str,
    version: &str,
    file_description: &str,
) -> PathBuf {
    let app = dir.join(bundle);
    let macos = app.join("Contents").join("MacOS");
    fs::create_dir_all(&macos).unwrap();
    fs::write(
        app.join("Contents").join("Info.plist"),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleName</key>
	<string>{name}</string>
	<key>CFBundleIdentifier</key>
	<string>{identifier}</string>
	<key>CFBundleShortVersionString</key>
	<string>{version}</string>
	<key>CFBundleExecutable</key>
	<string>{name}</string>
</dict>
</plist>
"#
        ),
    )
    .unwrap();
    fs::write(macos.join(name), file_description).unwrap();
    app
}

/// Writes a disk image stand-in that "mounts" `volume`.
pub fn write_dmg(path: &Path, volume: &Path, license_gated: bool) {
    let mut text = format!("mount:{}\n", volume.display());
    if license_gated {
        text.push_str("SLA\n");
    }
    fs::write(path, text).unwrap();
}

pub const ARM64: &str = "Mach-O 64-bit executable arm64";
pub const X86_64: &str = "Mach-O 64-bit executable x86_64";
pub const FAT: &str =
    "Mach-O universal binary with 2 architectures: [x86_64:Mach-O 64-bit executable x86_64] [arm64]";
pub const SCRIPT: &str = "POSIX shell script text executable, ASCII text";

/// Test environment rooted in one temp directory.
pub struct Sandbox {
    pub dir: tempfile::TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Creates (and returns) `rel` under the sandbox.
    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.path().join(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.path().join("work")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join("out")
    }

    pub fn settings(&self, policy: ArchitecturePolicy) -> Settings {
        SettingsBuilder::new()
            .architecture_policy(policy)
            .workspace_root(self.workspace_root())
            .mount_root(self.path().join("mnt"))
            .build()
    }

    /// Entries left in the workspace root.
    pub fn leftover_workspaces(&self) -> usize {
        fs::read_dir(self.workspace_root())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
