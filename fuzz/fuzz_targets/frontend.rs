#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 32 * 1024 {
        return;
    }
    let src = String::from_utf8_lossy(data);
    let Ok(checked) = kindml::check_source(&src, &kindml::Config::default()) else {
        return;
    };
    // Printing walks every type and kind the checker produced.
    let _ = checked.ty.to_string();
    let _ = checked.kind.to_string();
});
