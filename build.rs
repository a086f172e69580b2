// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

// 构建脚本: 静态链接 FFmpeg (vcpkg) 时补充 Windows 系统库
fn main() {
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        // vcpkg 的 FFmpeg 静态库依赖 (QSV / x264)
        println!("cargo:rustc-link-lib=dylib=libmfx");
        println!("cargo:rustc-link-lib=dylib=libx264");

        // dshow 摄像头输入
        println!("cargo:rustc-link-lib=dylib=ole32");
        println!("cargo:rustc-link-lib=dylib=strmiids");
        println!("cargo:rustc-link-lib=dylib=oleaut32");
        println!("cargo:rustc-link-lib=dylib=vfw32");

        println!("cargo:rustc-link-lib=dylib=secur32");
    }
}
