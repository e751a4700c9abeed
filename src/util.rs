use std::time::Duration;

use anyhow::Result;

/// Parsea el offset de tiempo del comando `goto`.
///
/// Acepta `ss`, `mm:ss` y `hh:mm:ss`.
pub fn parse_time_offset(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        anyhow::bail!("tiempo vacío");
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let numbers: Vec<u64> = parts
        .iter()
        .map(|p| {
            p.parse::<u64>()
                .map_err(|_| anyhow::anyhow!("tiempo inválido: `{}`", input))
        })
        .collect::<Result<_>>()?;

    let seconds = match numbers.as_slice() {
        [s] => *s,
        [m, s] if *s < 60 => m * 60 + s,
        [h, m, s] if *m < 60 && *s < 60 => h * 3600 + m * 60 + s,
        _ => anyhow::bail!("tiempo inválido: `{}`", input),
    };

    Ok(Duration::from_secs(seconds))
}

/// Formatea una duración para mostrarla al usuario.
///
/// Las pistas sin duración conocida (sondeo fallido o pendiente) se muestran
/// como `??` en lugar de `0s`.
pub fn format_length(length: Duration) -> String {
    if length.is_zero() {
        "??".to_string()
    } else {
        humantime::format_duration(length).to_string()
    }
}
