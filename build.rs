// If no resolution or pixel format feature is specified, capture QQVGA greyscale
use std::env;

fn main() {
    println!("cargo:rustc-check-cfg=cfg(resolution, values(\"qqvga\", \"qvga\", \"vga\"))");
    println!("cargo:rustc-check-cfg=cfg(pixel_format, values(\"greyscale\", \"rgb565\", \"bayer\"))");

    let resolution = if feature("VGA") {
        "vga"
    } else if feature("QVGA") {
        "qvga"
    } else {
        "qqvga"
    };
    println!("cargo:rustc-cfg=resolution=\"{}\"", resolution);

    let pixel_format = if feature("RGB565") {
        "rgb565"
    } else if feature("BAYER") {
        "bayer"
    } else {
        "greyscale"
    };
    println!("cargo:rustc-cfg=pixel_format=\"{}\"", pixel_format);
}

fn feature(name: &str) -> bool {
    env::var_os(format!("CARGO_FEATURE_{}", name)).is_some()
}
