//! Build script for the cli-tray-wrapper binary
//! Embeds Windows resource metadata

fn main() {
    #[cfg(windows)]
    {
        let mut res = winresource::WindowsResource::new();
        res.set("FileDescription", "CLI Tray Wrapper");
        res.set("ProductName", "CLI Tray Wrapper");
        res.set("InternalName", "cli-tray-wrapper");
        res.set("OriginalFilename", "cli-tray-wrapper.exe");
        res.set("ProductVersion", env!("CARGO_PKG_VERSION"));
        res.set("FileVersion", env!("CARGO_PKG_VERSION"));

        if let Err(e) = res.compile() {
            println!("cargo:warning=Failed to compile Windows resources: {}", e);
        }
    }
}
