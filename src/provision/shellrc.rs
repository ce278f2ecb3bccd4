//! Generated `~/.bashrc` and the prompt init line

use sshkit::{RemoteCommand, sh_quote};

use crate::config::DesiredStateConfig;

/// Appended to the remote `~/.bashrc` as the last action of an apply run
pub const PROMPT_INIT_LINE: &str =
    "command -v starship >/dev/null 2>&1 && eval \"$(starship init bash)\"";

/// Render the staged `.bashrc` for `config`
pub fn render_bashrc(config: &DesiredStateConfig) -> String {
    let env = &config.env_name;
    format!(
        r#"# Generated by hostprep. Local edits are overwritten on the next run.

export LANG=en_US.UTF-8
export PATH="$HOME/.local/bin:$HOME/bin:$PATH"
export MANPATH="$HOME/.local/share/man:$MANPATH"
export DATA_DIR="$HOME/data"

# Everything below only matters for interactive shells
case $- in
    *i*) ;;
    *) return ;;
esac

# Environment
alias act='conda activate {env}'
alias deact='conda deactivate'

# Scheduler
alias sq='squeue -u $USER'
alias sb='sbatch'
alias sc='scancel'
alias si='sinfo'

if [ -f "$HOME/miniconda3/etc/profile.d/conda.sh" ]; then
    . "$HOME/miniconda3/etc/profile.d/conda.sh"
fi

if [ -f "$HOME/.fzf.bash" ]; then
    . "$HOME/.fzf.bash"
fi

command -v zoxide >/dev/null 2>&1 && eval "$(zoxide init bash)"
"#
    )
}

/// Append [`PROMPT_INIT_LINE`] unless `~/.bashrc` already has it
pub fn prompt_init_command() -> RemoteCommand {
    let line = sh_quote(PROMPT_INIT_LINE);
    RemoteCommand::shell(format!("grep -qxF {line} \"$HOME/.bashrc\" 2>/dev/null"))
        .or(RemoteCommand::shell(format!("printf '%s\\n' {line} >> \"$HOME/.bashrc\"")))
}
