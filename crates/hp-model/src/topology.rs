//! Cycle topologies as compositions of features.
//!
//! A type tag such as `ihx_pc_econ_closed` or `cascade_ic_trans` is read
//! token by token into a [`Layout`]. Staging, intercooling and transcritical
//! operation apply to the high-temperature loop of a cascade; `ihx` applies
//! to every loop.

use std::fmt;

use hp_project::EconType;

use crate::error::{ModelError, ModelResult};

/// Every type tag the model is shipped with.
pub const REGISTRY: &[&str] = &[
    "simple",
    "simple_trans",
    "ihx",
    "ihx_trans",
    "ic",
    "ic_trans",
    "econ_closed",
    "econ_open",
    "ihx_econ_closed",
    "ihx_econ_open",
    "pc_econ_closed",
    "pc_econ_open",
    "ihx_pc_econ_closed",
    "ihx_pc_econ_open",
    "flash",
    "flash_trans",
    "pc_flash",
    "cascade",
    "cascade_trans",
    "cascade_ihx",
    "cascade_ic",
    "cascade_ic_trans",
    "cascade_econ_closed",
    "cascade_econ_open",
    "cascade_pc_econ_closed",
    "cascade_pc_econ_open",
    "cascade_flash",
];

/// Where intermediate-pressure vapor comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injection {
    Economizer(EconType),
    Flash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staging {
    Single,
    /// Two compressors with an intercooler between them.
    Intercooled,
    /// Vapor injected at intermediate pressure, either between two
    /// compressors or into a parallel compressor.
    Injected { injection: Injection, parallel: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopFeatures {
    pub staging: Staging,
    pub ihx: bool,
    pub transcritical: bool,
}

impl LoopFeatures {
    pub const PLAIN: LoopFeatures = LoopFeatures {
        staging: Staging::Single,
        ihx: false,
        transcritical: false,
    };

    pub fn is_staged(&self) -> bool {
        !matches!(self.staging, Staging::Single)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Single(LoopFeatures),
    Cascade { lt: LoopFeatures, ht: LoopFeatures },
}

impl Layout {
    /// Read a type tag. `econ` supplies the economizer type when the tag
    /// names an economizer without `open`/`closed`.
    pub fn parse(tag: &str, econ: Option<EconType>) -> ModelResult<Layout> {
        let bad = |why: &str| ModelError::configuration(format!("topology '{tag}': {why}"));
        if tag.trim().is_empty() {
            return Err(bad("empty type tag"));
        }

        let mut cascade = false;
        let mut ihx = false;
        let mut ic = false;
        let mut pc = false;
        let mut use_econ = false;
        let mut flash = false;
        let mut trans = false;
        let mut simple = false;
        let mut econ_type: Option<EconType> = None;

        for token in tag.split('_') {
            match token {
                "cascade" => cascade = true,
                "ihx" => ihx = true,
                "ic" => ic = true,
                "pc" => pc = true,
                "econ" => use_econ = true,
                "flash" => flash = true,
                "trans" => trans = true,
                "simple" => simple = true,
                "open" => econ_type = Some(EconType::Open),
                "closed" => econ_type = Some(EconType::Closed),
                other => return Err(bad(&format!("unknown token '{other}'"))),
            }
        }

        if simple && (cascade || ihx || ic || pc || use_econ || flash) {
            return Err(bad("'simple' combines only with 'trans'"));
        }
        if econ_type.is_some() && !use_econ {
            return Err(bad("econ type given without 'econ'"));
        }
        if use_econ && flash {
            return Err(bad("'econ' and 'flash' are exclusive"));
        }
        if ic && (use_econ || flash) {
            return Err(bad("'ic' does not combine with vapor injection"));
        }
        if pc && !(use_econ || flash) {
            return Err(bad("'pc' needs 'econ' or 'flash'"));
        }

        let injection = if use_econ {
            let kind = econ_type
                .or(econ)
                .ok_or_else(|| bad("economizer type missing (setup.econ must be open or closed)"))?;
            Some(Injection::Economizer(kind))
        } else if flash {
            Some(Injection::Flash)
        } else {
            None
        };
        let staging = match (injection, ic) {
            (Some(injection), _) => Staging::Injected {
                injection,
                parallel: pc,
            },
            (None, true) => Staging::Intercooled,
            (None, false) => Staging::Single,
        };

        let ht = LoopFeatures {
            staging,
            ihx,
            transcritical: trans,
        };
        Ok(if cascade {
            Layout::Cascade {
                lt: LoopFeatures { ihx, ..LoopFeatures::PLAIN },
                ht,
            }
        } else {
            Layout::Single(ht)
        })
    }

    pub fn is_cascade(&self) -> bool {
        matches!(self, Layout::Cascade { .. })
    }

    /// Features of the loop that rejects heat to the sink.
    pub fn high_loop(&self) -> &LoopFeatures {
        match self {
            Layout::Single(features) => features,
            Layout::Cascade { ht, .. } => ht,
        }
    }

    pub fn is_transcritical(&self) -> bool {
        self.high_loop().transcritical
    }

    /// Canonical type tag.
    pub fn tag(&self) -> String {
        let mut tokens: Vec<&str> = Vec::new();
        if self.is_cascade() {
            tokens.push("cascade");
        }
        let high = self.high_loop();
        if high.ihx {
            tokens.push("ihx");
        }
        match high.staging {
            Staging::Single => {}
            Staging::Intercooled => tokens.push("ic"),
            Staging::Injected { injection, parallel } => {
                if parallel {
                    tokens.push("pc");
                }
                match injection {
                    Injection::Economizer(kind) => {
                        tokens.push("econ");
                        tokens.push(kind.as_str());
                    }
                    Injection::Flash => tokens.push("flash"),
                }
            }
        }
        if high.transcritical {
            tokens.push("trans");
        }
        if tokens.is_empty() || tokens == ["trans"] {
            tokens.insert(0, "simple");
        }
        tokens.join("_")
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}
