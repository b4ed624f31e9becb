//! Key and lighting configuration handlers.

use std::path::Path;

use anyhow::{anyhow, bail, Context as _};
use meowpad_keyboard::{
    validator, ApplyOutcome, Configuration, KeyCode, LightingConfig, LightingMode, Rgb,
};
use meowpad_transport::DeviceFamily;

use super::{CommandResult, Context};
use crate::cli::{ConfigSetArgs, FamilyArg};

/// Report the save step of a set-then-save sequence
pub(crate) fn report_outcome(outcome: ApplyOutcome, what: &str) -> CommandResult {
    match outcome {
        ApplyOutcome::Saved => {
            println!("{what} saved");
            Ok(())
        }
        ApplyOutcome::StagedNotSaved(e) => {
            bail!("{what} is active but was not saved ({e}); it will be lost on power-off")
        }
    }
}

fn on_off(b: bool) -> &'static str {
    if b {
        "on"
    } else {
        "off"
    }
}

fn print_config(config: &Configuration) {
    let flags = |jitter: u16, cr: bool, kf: bool| {
        println!("Debounce:          {jitter} ms");
        println!("Continuous report: {}", on_off(cr));
        println!("Kalman filter:     {}", on_off(kf));
    };
    let keypad_keys = |keys: &[meowpad_keyboard::KeyConfig]| {
        println!("Key  Press  Release  DeadZone  Actions");
        for (i, k) in keys.iter().enumerate() {
            let actions: Vec<String> = k.actions.iter().map(KeyCode::to_string).collect();
            println!(
                "{:>3}  {:>4}%  {:>6}%  {:>7}%  {}",
                i,
                k.press,
                k.release,
                k.dead_zone,
                actions.join("+")
            );
        }
    };
    match config {
        Configuration::ThreeKey(c) => {
            keypad_keys(&c.keys);
            let side: Vec<String> = c.side_button.iter().map(KeyCode::to_string).collect();
            println!("Side button:       {}", side.join("+"));
            flags(c.jitter_ms, c.continuous_report, c.kalman_filter);
        }
        Configuration::FourKey(c) => {
            keypad_keys(&c.keys);
            flags(c.jitter_ms, c.continuous_report, c.kalman_filter);
            println!("High speed:        {}", on_off(c.high_speed));
        }
        Configuration::Board(c) => {
            println!("Key  Press  Release  DeadZone  RelDeadZone  Normal / Fn");
            for (i, k) in c.keys.iter().enumerate() {
                println!(
                    "{:>3}  {:>4}%  {:>6}%  {:>7}%  {:>10}%  {} / {}",
                    i,
                    k.press,
                    k.release,
                    k.dead_zone,
                    k.release_dead_zone,
                    c.normal_layer.get(i).copied().unwrap_or_default(),
                    c.fn_layer.get(i).copied().unwrap_or_default()
                );
            }
            flags(c.jitter_ms, c.continuous_report, c.kalman_filter);
            println!("High speed:        {}", on_off(c.high_speed));
        }
    }
}

/// Print the key configuration
pub async fn get(ctx: &Context, json: bool) -> CommandResult {
    let pad = ctx.connect().await?;
    let config = pad.get_config().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print_config(&config);
    }
    Ok(())
}

/// Apply `args` to `config`; range checks are left to the codec
fn apply_args(config: &mut Configuration, args: &ConfigSetArgs) -> anyhow::Result<()> {
    let count = config.key_count();
    let selected: Vec<usize> = match args.key {
        Some(k) if k >= count => bail!("Key {k} out of range (0..{count})"),
        Some(k) => vec![k],
        None => (0..count).collect(),
    };
    let actions = args
        .actions
        .as_ref()
        .map(|names| {
            names
                .iter()
                .map(|n| n.parse::<KeyCode>())
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let (jitter, cr, kf, hs) = match config {
        Configuration::ThreeKey(c) => {
            for &i in &selected {
                let key = &mut c.keys[i];
                key.press = args.press.unwrap_or(key.press);
                key.release = args.release.unwrap_or(key.release);
                key.dead_zone = args.dead_zone.unwrap_or(key.dead_zone);
                if let Some(actions) = &actions {
                    key.actions = actions.clone();
                }
            }
            if args.high_speed.is_some() {
                bail!("The three-key pad has no high speed mode");
            }
            (&mut c.jitter_ms, &mut c.continuous_report, &mut c.kalman_filter, None)
        }
        Configuration::FourKey(c) => {
            for &i in &selected {
                let key = &mut c.keys[i];
                key.press = args.press.unwrap_or(key.press);
                key.release = args.release.unwrap_or(key.release);
                key.dead_zone = args.dead_zone.unwrap_or(key.dead_zone);
                if let Some(actions) = &actions {
                    key.actions = actions.clone();
                }
            }
            (
                &mut c.jitter_ms,
                &mut c.continuous_report,
                &mut c.kalman_filter,
                Some(&mut c.high_speed),
            )
        }
        Configuration::Board(c) => {
            if actions.is_some() {
                bail!("Boards map keys through layers; edit them with a preset");
            }
            for &i in &selected {
                let key = &mut c.keys[i];
                key.press = args.press.unwrap_or(key.press);
                key.release = args.release.unwrap_or(key.release);
                key.dead_zone = args.dead_zone.unwrap_or(key.dead_zone);
            }
            (
                &mut c.jitter_ms,
                &mut c.continuous_report,
                &mut c.kalman_filter,
                Some(&mut c.high_speed),
            )
        }
    };
    if let Some(v) = args.jitter {
        *jitter = v;
    }
    if let Some(v) = args.continuous_report {
        *cr = v;
    }
    if let Some(v) = args.kalman_filter {
        *kf = v;
    }
    if let (Some(v), Some(hs)) = (args.high_speed, hs) {
        *hs = v;
    }
    Ok(())
}

/// Change key settings and save them
pub async fn set(ctx: &Context, args: &ConfigSetArgs) -> CommandResult {
    let pad = ctx.connect().await?;
    let mut config = pad.get_config().await?;
    apply_args(&mut config, args)?;
    report_outcome(pad.apply_config(&config).await?, "Key configuration")
}

/// Write the raw configuration to a file
pub async fn export(ctx: &Context, file: &Path) -> CommandResult {
    let pad = ctx.connect().await?;
    let raw = pad.get_raw_config().await?;
    std::fs::write(file, &raw).with_context(|| format!("writing {}", file.display()))?;
    println!("Wrote {} bytes to {}", raw.len(), file.display());
    Ok(())
}

/// Validate, write and save a raw configuration file
pub async fn import(ctx: &Context, file: &Path) -> CommandResult {
    let pad = ctx.connect().await?;
    let raw = validator::load_raw_file(pad.family(), file)?;
    report_outcome(pad.set_raw_config(&raw).await?, "Configuration")
}

/// Validate a raw file, offline when a family is given
pub async fn check(ctx: &Context, file: &Path, family: Option<FamilyArg>) -> CommandResult {
    let family: DeviceFamily = match family {
        Some(f) => f.into(),
        None => ctx.connect().await?.family(),
    };
    let raw = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    match validator::validate(family, &raw) {
        Ok(()) => {
            println!("{}: valid {} configuration", file.display(), family);
            Ok(())
        }
        Err(e) => bail!("{}: {e}", file.display()),
    }
}

fn print_lighting(light: &LightingConfig) {
    let colors: Vec<String> = light.colors.iter().map(Rgb::to_string).collect();
    println!("Mode:       {}", light.mode);
    println!("Brightness: {}%", light.max_brightness);
    println!("Sleep:      {} s", light.sleep_time);
    println!("Colors:     {}", colors.join(" "));
    if let Some(effects) = &light.effects {
        println!("Sleep mode: {}", effects.sleep_mode);
    }
}

/// Print the lighting configuration
pub async fn light_get(ctx: &Context, json: bool) -> CommandResult {
    let pad = ctx.connect().await?;
    let light = pad.get_light_config().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&light)?);
    } else {
        print_lighting(&light);
    }
    Ok(())
}

/// Change lighting and save it
pub async fn light_set(
    ctx: &Context,
    mode: Option<&str>,
    brightness: Option<u8>,
    color: Option<&str>,
) -> CommandResult {
    let pad = ctx.connect().await?;
    let mut light = pad.get_light_config().await?;
    if let Some(mode) = mode {
        light.mode = mode.parse::<LightingMode>().map_err(|e| anyhow!(e))?;
    }
    if let Some(b) = brightness {
        light.max_brightness = b;
    }
    if let Some(color) = color {
        let rgb: Rgb = color.parse().map_err(|e: String| anyhow!(e))?;
        light.colors.iter_mut().for_each(|c| *c = rgb);
    }
    report_outcome(pad.apply_light_config(&light).await?, "Lighting")
}
