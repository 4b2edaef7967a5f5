use chrono::Utc;

fn main() {
    // 设置构建时间，页面底部显示
    let build_time = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
    println!("cargo:rustc-env=BUILD_TIME={}", build_time);

    // 模板通过 include_str! 编译进二进制
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=templates");
}
