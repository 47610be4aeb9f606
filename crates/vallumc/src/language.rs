pub const LANG_ID: &str = "vallum-core@0.1.0";

/// Name of the entry function every script module must declare.
pub const ENTRY_FUNCTION: &str = "main";

pub mod limits {
    pub const MAX_SOURCE_BYTES: usize = 4 * 1024 * 1024;
    pub const MAX_SPECIALIZATIONS: usize = 4_096;
    pub const MAX_TYPE_DEPTH: usize = 64;
    pub const MAX_EVAL_STEPS: u64 = 10_000_000;

    pub fn max_source_bytes() -> usize {
        match std::env::var("VALLUM_MAX_SOURCE_BYTES") {
            Ok(v) => v
                .parse::<usize>()
                .ok()
                .filter(|v| *v > 0)
                .unwrap_or(MAX_SOURCE_BYTES),
            Err(_) => MAX_SOURCE_BYTES,
        }
    }

    pub fn max_specializations() -> usize {
        match std::env::var("VALLUM_MAX_SPECIALIZATIONS") {
            Ok(v) => v
                .parse::<usize>()
                .ok()
                .filter(|v| *v > 0)
                .unwrap_or(MAX_SPECIALIZATIONS),
            Err(_) => MAX_SPECIALIZATIONS,
        }
    }

    pub fn max_type_depth() -> usize {
        match std::env::var("VALLUM_MAX_TYPE_DEPTH") {
            Ok(v) => v
                .parse::<usize>()
                .ok()
                .filter(|v| *v > 0)
                .unwrap_or(MAX_TYPE_DEPTH),
            Err(_) => MAX_TYPE_DEPTH,
        }
    }

    pub fn max_eval_steps() -> u64 {
        match std::env::var("VALLUM_MAX_EVAL_STEPS") {
            Ok(v) => v
                .parse::<u64>()
                .ok()
                .filter(|v| *v > 0)
                .unwrap_or(MAX_EVAL_STEPS),
            Err(_) => MAX_EVAL_STEPS,
        }
    }
}
