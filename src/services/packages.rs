use crate::services::runner::WineCommand;
use std::fmt;

/// Installable component, each backed by one winetricks verb
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Package {
    /// DirectX 9 D3DX libraries; `None` installs all of them, `Some("43")` just `d3dx9_43`
    D3dx9(Option<String>),
    /// DXVK (Vulkan based Direct3D 9/10/11); `None` is the latest release
    Dxvk(Option<String>),
    /// Visual C++ redistributable by year, e.g. "2019"
    VisualCpp(String),
    /// .NET Framework by version, e.g. "4.8" or "48"
    DotNet(String),
    CoreFonts,
    Liberation,
}

impl Package {
    /// Verb passed to `winetricks -q`
    pub fn winetricks_verb(&self) -> String {
        match self {
            Package::D3dx9(None) => "d3dx9".to_string(),
            Package::D3dx9(Some(version)) => format!("d3dx9_{}", version.trim()),
            Package::Dxvk(None) => "dxvk".to_string(),
            Package::Dxvk(Some(version)) => format!("dxvk{}", version.trim().replace('.', "")),
            Package::VisualCpp(year) => format!("vcrun{}", year.trim()),
            Package::DotNet(version) => format!("dotnet{}", version.trim().replace('.', "")),
            Package::CoreFonts => "corefonts".to_string(),
            Package::Liberation => "liberation".to_string(),
        }
    }

    /// The full install command
    pub fn command(&self) -> WineCommand {
        WineCommand::new("winetricks")
            .arg("-q")
            .arg("--force")
            .arg(self.winetricks_verb())
    }

    /// Parse the console form, e.g. `dxvk`, `dxvk 1.10.3`, `vcrun 2019`
    pub fn parse(name: &str, version: Option<&str>) -> Option<Self> {
        let version = version.map(str::trim).filter(|v| !v.is_empty());
        match name.trim().to_ascii_lowercase().as_str() {
            "d3dx9" => Some(Package::D3dx9(version.map(str::to_string))),
            "dxvk" => Some(Package::Dxvk(version.map(str::to_string))),
            "vcrun" | "visualcpp" => {
                Some(Package::VisualCpp(version.unwrap_or("2019").to_string()))
            }
            "dotnet" => Some(Package::DotNet(version.unwrap_or("48").to_string())),
            "corefonts" => Some(Package::CoreFonts),
            "liberation" => Some(Package::Liberation),
            _ => None,
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Package::D3dx9(None) => f.write_str("DirectX 9 (all D3DX9 libraries)"),
            Package::D3dx9(Some(v)) => write!(f, "DirectX 9 (d3dx9_{})", v),
            Package::Dxvk(None) => f.write_str("DXVK (latest)"),
            Package::Dxvk(Some(v)) => write!(f, "DXVK {}", v),
            Package::VisualCpp(year) => write!(f, "Visual C++ {} redistributable", year),
            Package::DotNet(v) => write!(f, ".NET Framework {}", v),
            Package::CoreFonts => f.write_str("MS Core Fonts"),
            Package::Liberation => f.write_str("Liberation Fonts"),
        }
    }
}
