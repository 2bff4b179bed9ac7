use hover_core::{Format, Platform, Target};

/// One file of a packaging recipe: name on disk plus template text.
pub struct RecipeFile {
    pub name: &'static str,
    pub contents: &'static str,
}

/// Static description of how one (platform, format) pair is packaged.
pub struct RecipeSpec {
    pub platform: Platform,
    pub format: Format,
    /// Some formats can only be containerized on a specific host family.
    pub requires_host: Option<Platform>,
    /// The earlier bundle output is staged in as well.
    pub needs_bundle: bool,
    pub dockerfile: &'static str,
    pub extra_files: &'static [RecipeFile],
    /// Shell commands run inside the container, joined with `&&`.
    pub commands: &'static [&'static str],
    /// Artifact the commands leave in the staging root.
    pub artifact: &'static str,
}

impl RecipeSpec {
    pub fn target(&self) -> Target {
        Target::packaged(self.platform, self.format)
    }
}

static RECIPES: &[RecipeSpec] = &[
    RecipeSpec {
        platform: Platform::Linux,
        format: Format::Deb,
        requires_host: None,
        needs_bundle: false,
        dockerfile: include_str!("../templates/linux-deb/Dockerfile"),
        extra_files: &[RecipeFile {
            name: "control",
            contents: include_str!("../templates/linux-deb/control"),
        }],
        commands: &[
            "mkdir -p pkg/DEBIAN pkg/usr/lib/{{name}} pkg/usr/bin",
            "cp control pkg/DEBIAN/control",
            "cp -R build/. pkg/usr/lib/{{name}}",
            "ln -s /usr/lib/{{name}}/{{name}} pkg/usr/bin/{{name}}",
            "fakeroot dpkg-deb --build pkg {{name}}_{{version}}_amd64.deb",
        ],
        artifact: "{{name}}_{{version}}_amd64.deb",
    },
    RecipeSpec {
        platform: Platform::Linux,
        format: Format::AppImage,
        requires_host: None,
        needs_bundle: false,
        dockerfile: include_str!("../templates/linux-appimage/Dockerfile"),
        extra_files: &[
            RecipeFile {
                name: "AppRun",
                contents: include_str!("../templates/linux-appimage/AppRun"),
            },
            RecipeFile {
                name: "app.desktop",
                contents: include_str!("../templates/linux-appimage/app.desktop"),
            },
        ],
        commands: &[
            "mkdir -p {{name}}.AppDir",
            "cp -R build/. {{name}}.AppDir",
            "cp AppRun {{name}}.AppDir/AppRun",
            "chmod +x {{name}}.AppDir/AppRun",
            "cp app.desktop {{name}}.AppDir/{{name}}.desktop",
            "appimagetool --appimage-extract-and-run {{name}}.AppDir {{name}}-{{version}}-x86_64.AppImage",
        ],
        artifact: "{{name}}-{{version}}-x86_64.AppImage",
    },
    RecipeSpec {
        platform: Platform::Linux,
        format: Format::Snap,
        requires_host: Some(Platform::Linux),
        needs_bundle: false,
        dockerfile: include_str!("../templates/linux-snap/Dockerfile"),
        extra_files: &[RecipeFile {
            name: "snapcraft.yaml",
            contents: include_str!("../templates/linux-snap/snapcraft.yaml"),
        }],
        commands: &["snapcraft --destructive-mode"],
        artifact: "{{name}}_{{version}}_amd64.snap",
    },
    RecipeSpec {
        platform: Platform::Darwin,
        format: Format::Bundle,
        requires_host: None,
        needs_bundle: false,
        dockerfile: include_str!("../templates/darwin-bundle/Dockerfile"),
        extra_files: &[RecipeFile {
            name: "Info.plist",
            contents: include_str!("../templates/darwin-bundle/Info.plist"),
        }],
        commands: &[
            "mkdir -p {{name}}.app/Contents/MacOS {{name}}.app/Contents/Resources",
            "cp Info.plist {{name}}.app/Contents/Info.plist",
            "cp -R build/. {{name}}.app/Contents/MacOS",
        ],
        artifact: "{{name}}.app",
    },
    RecipeSpec {
        platform: Platform::Darwin,
        format: Format::Pkg,
        requires_host: None,
        needs_bundle: true,
        dockerfile: include_str!("../templates/darwin-pkg/Dockerfile"),
        extra_files: &[RecipeFile {
            name: "PackageInfo",
            contents: include_str!("../templates/darwin-pkg/PackageInfo"),
        }],
        commands: &[
            "mkdir -p root/Applications",
            "cp -R {{name}}.app root/Applications/",
            "( cd root && find . | cpio -o --format odc --owner 0:80 | gzip -c ) > Payload",
            "mkbom -u 0 -g 80 root Bom",
            "xar --compression none -cf {{name}}-{{version}}.pkg Payload Bom PackageInfo",
        ],
        artifact: "{{name}}-{{version}}.pkg",
    },
    RecipeSpec {
        platform: Platform::Windows,
        format: Format::Msi,
        requires_host: None,
        needs_bundle: false,
        dockerfile: include_str!("../templates/windows-msi/Dockerfile"),
        extra_files: &[RecipeFile {
            name: "app.wxs",
            contents: include_str!("../templates/windows-msi/app.wxs"),
        }],
        commands: &["wixl -o {{name}}-{{version}}.msi app.wxs"],
        artifact: "{{name}}-{{version}}.msi",
    },
];

pub fn recipe_for(target: Target) -> Option<&'static RecipeSpec> {
    RECIPES
        .iter()
        .find(|recipe| recipe.target() == target)
}

/// Supplies recipe template files; the default serves the compiled-in set.
/// Tests install an in-memory provider.
pub trait RecipeAssets {
    /// All recipe files for a target, Dockerfile first, with the stable
    /// `{{name}}` placeholder already rendered.
    fn files(&self, target: Target, project_name: &str) -> Option<Vec<(String, String)>>;
}

pub struct EmbeddedRecipes;

impl RecipeAssets for EmbeddedRecipes {
    fn files(&self, target: Target, project_name: &str) -> Option<Vec<(String, String)>> {
        let recipe = recipe_for(target)?;
        let mut files = vec![(
            "Dockerfile".to_string(),
            render_name(recipe.dockerfile, project_name),
        )];
        for file in recipe.extra_files {
            files.push((file.name.to_string(), render_name(file.contents, project_name)));
        }
        Some(files)
    }
}

/// Renders the stable project-name placeholder; the version placeholder is
/// left for pack time, when the release version is known.
pub fn render_name(template: &str, name: &str) -> String {
    template.replace("{{name}}", name)
}

pub fn render(template: &str, name: &str, version: &str, mode: &str) -> String {
    template
        .replace("{{name}}", name)
        .replace("{{version}}", version)
        .replace("{{mode}}", mode)
}
