//! Derive the executable and argument list for an invocation.

use crate::core::types::{InvocationSpec, ResolvedCommand};

/// Resolve the program and arguments that `spec` describes.
///
/// Shell mode runs `<shell> <shell_flag> <script>`, where the script is
/// `command` followed by the space-joined `args`. Direct mode splits a
/// `command` whose first space comes after at least one character into an
/// executable and its arguments; in that case `args` is ignored entirely.
/// Otherwise, including a leading space, `command` is the executable and
/// `args` are passed through unchanged.
pub fn resolve(spec: &InvocationSpec, shell: &str, shell_flag: &str) -> ResolvedCommand {
    if spec.use_shell {
        return ResolvedCommand {
            program: shell.to_string(),
            args: vec![shell_flag.to_string(), shell_script(spec)],
        };
    }

    if spec.command.find(' ').is_some_and(|i| i > 0) {
        let mut tokens = spec.command.split(' ').filter(|t| !t.is_empty());
        if let Some(program) = tokens.next() {
            return ResolvedCommand {
                program: program.to_string(),
                args: tokens.map(str::to_string).collect(),
            };
        }
    }

    ResolvedCommand {
        program: spec.command.clone(),
        args: spec.args.clone(),
    }
}

fn shell_script(spec: &InvocationSpec) -> String {
    if spec.args.is_empty() {
        spec.command.clone()
    } else {
        format!("{} {}", spec.command, spec.args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(spec: InvocationSpec) -> ResolvedCommand {
        resolve(&spec, "/bin/bash", "-c")
    }

    #[test]
    fn bare_command_is_used_verbatim() {
        let resolved = direct(InvocationSpec::new("/usr/bin/env"));
        assert_eq!(resolved.program, "/usr/bin/env");
        assert!(resolved.args.is_empty());
    }

    #[test]
    fn command_with_spaces_is_split_into_program_and_args() {
        let resolved = direct(InvocationSpec::new("foo bar baz"));
        assert_eq!(resolved.program, "foo");
        assert_eq!(resolved.args, vec!["bar", "baz"]);
    }

    #[test]
    fn runs_of_spaces_do_not_produce_empty_args() {
        let resolved = direct(InvocationSpec::new("foo  bar   baz"));
        assert_eq!(resolved.program, "foo");
        assert_eq!(resolved.args, vec!["bar", "baz"]);
    }

    #[test]
    fn explicit_args_pass_through_unchanged() {
        let resolved = direct(InvocationSpec::new("printf").args(["%s\n", "a b"]));
        assert_eq!(resolved.program, "printf");
        assert_eq!(resolved.args, vec!["%s\n", "a b"]);
    }

    /// A spaced command still gets split when explicit args are present, and
    /// the explicit args are dropped. Callers mixing both get the split
    /// command only.
    #[test]
    fn spaced_command_with_args_splits_command_and_drops_args() {
        let resolved = direct(InvocationSpec::new("git log").arg("--oneline"));
        assert_eq!(resolved.program, "git");
        assert_eq!(resolved.args, vec!["log"]);
    }

    #[test]
    fn leading_space_keeps_command_and_args_verbatim() {
        let resolved = direct(InvocationSpec::new(" ls -l").arg("/tmp"));
        assert_eq!(resolved.program, " ls -l");
        assert_eq!(resolved.args, vec!["/tmp"]);
    }

    #[test]
    fn shell_mode_uses_command_as_script() {
        let spec = InvocationSpec::new("echo hi").shell(true);
        let resolved = resolve(&spec, "/bin/sh", "-c");
        assert_eq!(resolved.program, "/bin/sh");
        assert_eq!(resolved.args, vec!["-c", "echo hi"]);
    }

    #[test]
    fn shell_mode_joins_command_and_args() {
        let spec = InvocationSpec::new("echo").args(["a", "b"]).shell(true);
        let resolved = resolve(&spec, "/bin/bash", "-c");
        assert_eq!(resolved.args, vec!["-c", "echo a b"]);
    }
}
