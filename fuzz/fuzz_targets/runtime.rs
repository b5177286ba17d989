#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Only small programs are run, always under a fuel budget to avoid hangs.
    if data.len() > 4 * 1024 {
        return;
    }
    let src = String::from_utf8_lossy(data);
    let config = kindml::Config {
        fuel: Some(5_000),
        ..kindml::Config::default()
    };
    let _ = kindml::run_with_config(&src, &config);
});
