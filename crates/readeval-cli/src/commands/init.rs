//! The `readeval init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("readeval.toml"), SAMPLE_CONFIG)?;
    write_if_missing(Path::new("reference.toml"), SAMPLE_REFERENCE)?;

    println!("\nNext steps:");
    println!("  1. Export READEVAL_APP_ID, READEVAL_API_KEY and READEVAL_API_SECRET");
    println!("  2. Run: readeval validate --reference reference.toml");
    println!("  3. Run: readeval evaluate --audio child.pcm --text \"的 一 了\"");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# readeval configuration

reference = "reference.toml"
output_dir = "./readeval-results"

[engine]
app_id = "${READEVAL_APP_ID}"
api_key = "${READEVAL_API_KEY}"
api_secret = "${READEVAL_API_SECRET}"
url = "ws://ise-api.xfyun.cn/v2/open-ise"

[streaming]
frame_size = 1280
frame_interval_ms = 40
result_timeout_secs = 30
poll_interval_secs = 5

[evaluation]
max_concurrent = 3
pass_threshold = 60.0
group = "pupil"
language = "cn_vip"
sample_rate = 16000
audio_format = "raw"
"#;

const SAMPLE_REFERENCE: &str = r#"name = "example"

# Fluency sheet rows, read in order.
[[rows]]
characters = "的 一 了 我 是 不 在 上 来 有"

[[rows]]
characters = "着 他 地 子 人 们 到 个 小 这"

# Literacy groups: each correct character earns the coefficient.
[[groups]]
id = "g1"
coefficient = 1.0
characters = "人 口 手 大 小"

[[groups]]
id = "g2"
coefficient = 1.5
characters = "山 水 火 木 日"
"#;
