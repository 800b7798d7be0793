//! Publishing the named lines of GPIO chips as pins.

use std::sync::Arc;

use tracing::debug;

use crate::{
    chip::{chip_names, Chip, ChipOptions, GpioChip},
    errors::{Error, Result},
    pin::{pin_span, PinHandle},
    registry::{PinRegistry, SharedPin},
};

/// Register the lines of every GPIO chip in [`ChipOptions::dev_dir`].
///
/// A chip that fails does not stop the others, all failures are returned
/// together.
pub fn register_all(registry: &PinRegistry, options: &ChipOptions) -> Result<Vec<Arc<Chip>>> {
    let mut chips = Vec::new();
    let mut errs = Vec::new();

    for name in chip_names(&options.dev_dir)? {
        match register_chip(registry, &name, options) {
            Ok(chip) => chips.push(chip),
            Err(err) => errs.push(err),
        }
    }

    Error::join_all(errs, Error::Registration)?;
    Ok(chips)
}

/// Open the chip `name` and register its lines.
pub fn register_chip(registry: &PinRegistry, name: &str, options: &ChipOptions) -> Result<Arc<Chip>> {
    let chip = Chip::by_name(name, options).map_err(|source| Error::ChipOpen {
        name: name.to_owned(),
        source,
    })?;

    let chip = Arc::new(chip);
    register_lines(registry, Arc::clone(&chip))?;
    Ok(chip)
}

/// Register a pin for every named line of `chip`.
///
/// The pins are published as a single row header named after the chip in
/// upper case (`GPIOCHIP0`) and individually by line name. Lines without a
/// name are skipped.
pub fn register_lines<C: GpioChip>(
    registry: &PinRegistry,
    chip: Arc<C>,
) -> Result<Vec<Arc<PinHandle<C>>>> {
    let chip_name = chip.name().to_owned();
    let mut pins = Vec::new();

    for offset in chip.offsets() {
        let info = chip.line_info(offset).map_err(|source| Error::ChipLineInfo {
            chip: chip_name.clone(),
            offset,
            source,
        })?;

        let span = pin_span(&chip_name, &info);
        if info.name().is_empty() {
            span.in_scope(|| debug!("skipping line without name"));
            continue;
        }

        span.in_scope(|| debug!("found line"));
        pins.push(Arc::new(PinHandle::new(Arc::clone(&chip), info, span)));
    }

    let row: Vec<SharedPin> = pins.iter().map(|pin| Arc::clone(pin) as SharedPin).collect();
    registry.register_header(&chip_name.to_uppercase(), vec![row])?;

    for pin in &pins {
        registry.register(Arc::clone(pin) as SharedPin)?;
    }

    Ok(pins)
}
