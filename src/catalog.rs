// src/catalog.rs

//! Message catalog: numeric code + arguments → human-readable text.
//!
//! Templates use positional placeholders (`{0}`, `{1}`, ...). Missing
//! arguments leave the placeholder untouched; surplus arguments are ignored.
//! Unknown codes produce a generic "message not found" line instead of
//! failing, so every error path always has something to report.

/// Codes used by the script bridge and the one-shot script runner.
pub mod codes {
    pub const SCRIPT_FAILED: u32 = 12550;
    pub const PROJECT_NOT_FOUND: u32 = 12551;
    pub const PROJECT_NOT_OPENED: u32 = 12552;
    pub const SCRIPT_EXITED: u32 = 12573;
    pub const SCRIPT_NOT_FOUND: u32 = 12578;
    pub const SCRIPT_NOT_READABLE: u32 = 12579;
    pub const NO_TIME_WINDOW_CONTROL: u32 = 12587;
    pub const RUN_COMPUTE_FAILED: u32 = 12598;
    pub const TRIAL_COMPUTE_FAILED: u32 = 12599;
    pub const FORECAST_COMPUTE_FAILED: u32 = 12600;
    pub const SCRIPT_STARTED: u32 = 14650;

    // Command router and program handlers.
    pub const UNABLE_TO_PARSE: u32 = 15100;
    pub const UNABLE_TO_PROCESS: u32 = 15101;
    pub const COMMAND_NOT_DEFINED: u32 = 15102;
    pub const PROGRAM_NOT_SET: u32 = 15103;
    pub const UNKNOWN_PROGRAM: u32 = 15104;
    pub const UNCAUGHT_EXCEPTION: u32 = 15105;
    pub const MISSING_PARAMETER: u32 = 15110;
    pub const NO_PROJECT_OPEN: u32 = 15111;
    pub const UNKNOWN_TARGET: u32 = 15112;
    pub const DUPLICATE_TARGET: u32 = 15113;
    pub const COMPUTE_RETURNED: u32 = 15114;
    pub const INVALID_TIME_WINDOW: u32 = 15115;
}

static MESSAGES: &[(u32, &str)] = &[
    (codes::SCRIPT_FAILED, "Script \"{0}\" failed."),
    (codes::PROJECT_NOT_FOUND, "Project \"{0}\" could not be found."),
    (codes::PROJECT_NOT_OPENED, "Project \"{0}\" could not be opened."),
    (codes::SCRIPT_EXITED, "Script \"{0}\" exited with status {1}."),
    (codes::SCRIPT_NOT_FOUND, "Script file \"{0}\" does not exist."),
    (codes::SCRIPT_NOT_READABLE, "Script file \"{0}\" cannot be read."),
    (
        codes::NO_TIME_WINDOW_CONTROL,
        "No open project; the time window cannot be set.",
    ),
    (codes::RUN_COMPUTE_FAILED, "Simulation run \"{0}\" failed to compute."),
    (
        codes::TRIAL_COMPUTE_FAILED,
        "Optimization trial \"{0}\" failed to compute.",
    ),
    (codes::FORECAST_COMPUTE_FAILED, "Forecast \"{0}\" failed to compute."),
    (codes::SCRIPT_STARTED, "Running script \"{0}\"."),
    (codes::UNABLE_TO_PARSE, "Error parsing document string: {0}"),
    (codes::UNABLE_TO_PROCESS, "Unable to process document: {0}"),
    (codes::COMMAND_NOT_DEFINED, "Command is not defined: {0}"),
    (codes::PROGRAM_NOT_SET, "Client program is not set: {0}"),
    (codes::UNKNOWN_PROGRAM, "Unknown client program: {0}"),
    (
        codes::UNCAUGHT_EXCEPTION,
        "Uncaught exception executing command: {0}",
    ),
    (
        codes::MISSING_PARAMETER,
        "Command \"{0}\" requires parameter \"{1}\".",
    ),
    (codes::NO_PROJECT_OPEN, "Command \"{0}\" requires an open project."),
    (codes::UNKNOWN_TARGET, "{0} \"{1}\" does not exist."),
    (codes::DUPLICATE_TARGET, "{0} \"{1}\" already exists."),
    (codes::COMPUTE_RETURNED, "{0} \"{1}\" returned status {2}."),
    (
        codes::INVALID_TIME_WINDOW,
        "Time window start \"{0}\" must precede end \"{1}\".",
    ),
];

/// Look up the template for `code`.
pub fn template(code: u32) -> Option<&'static str> {
    MESSAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, text)| *text)
}

/// Format the message for `code` with positional `args`.
pub fn get_message<S: AsRef<str>>(code: u32, args: &[S]) -> String {
    match template(code) {
        Some(text) => format_template(text, args),
        None => {
            let joined: Vec<&str> = args.iter().map(|a| a.as_ref()).collect();
            format!("Message {code} not found; arguments: [{}]", joined.join(", "))
        }
    }
}

fn format_template<S: AsRef<str>>(text: &str, args: &[S]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let substituted = after.find('}').and_then(|close| {
            let index: usize = after[..close].parse().ok()?;
            let arg = args.get(index)?;
            Some((arg.as_ref(), close))
        });

        match substituted {
            Some((arg, close)) => {
                out.push_str(arg);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
