//! Parameter validation logic.

use crate::schema::{OffdesignDef, Params};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Temperature ordering violated: {lower} = {lower_value} must lie below {upper} = {upper_value}")]
    TemperatureOrder {
        lower: &'static str,
        lower_value: f64,
        upper: &'static str,
        upper_value: f64,
    },
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_params(params: &Params) -> Result<(), ValidationError> {
    if params.setup.kind.trim().is_empty() {
        return Err(invalid("setup.type", "\"\"", "must not be empty"));
    }
    if params.fluids.si.trim().is_empty() {
        return Err(invalid("fluids.si", "\"\"", "must not be empty"));
    }
    if params.fluids.so.trim().is_empty() {
        return Err(invalid("fluids.so", "\"\"", "must not be empty"));
    }

    for (field, t) in [
        ("B1.T", params.b1.t),
        ("B2.T", params.b2.t),
        ("C0.T", params.c0.t),
        ("C3.T", params.c3.t),
        ("ambient.T", params.ambient.t),
    ] {
        if !t.is_finite() {
            return Err(invalid(field, t, "must be finite"));
        }
    }
    for (field, p) in [
        ("B1.p", params.b1.p),
        ("B2.p", params.b2.p),
        ("C0.p", params.c0.p),
        ("C3.p", params.c3.p),
        ("ambient.p", params.ambient.p),
        ("A0.p", params.a0.as_ref().map(|a| a.p)),
    ] {
        if let Some(p) = p
            && !(p.is_finite() && p > 0.0)
        {
            return Err(invalid(field, p, "pressure must be positive"));
        }
    }

    if params.c0.t >= params.c3.t {
        return Err(ValidationError::TemperatureOrder {
            lower: "C0.T",
            lower_value: params.c0.t,
            upper: "C3.T",
            upper_value: params.c3.t,
        });
    }
    if params.b1.t >= params.c3.t {
        return Err(ValidationError::TemperatureOrder {
            lower: "B1.T",
            lower_value: params.b1.t,
            upper: "C3.T",
            upper_value: params.c3.t,
        });
    }

    for (label, comp) in &params.components {
        for (key, value) in [
            ("eta_s", comp.eta_s),
            ("pr", comp.pr),
            ("pr1", comp.pr1),
            ("pr2", comp.pr2),
        ] {
            if let Some(v) = value
                && !(v > 0.0 && v <= 1.0)
            {
                return Err(invalid(&format!("{label}.{key}"), v, "must lie in (0, 1]"));
            }
        }
        if let Some(q) = comp.q
            && !q.is_finite()
        {
            return Err(invalid(&format!("{label}.Q"), q, "must be finite"));
        }
    }

    if let Some(offdesign) = &params.offdesign {
        validate_offdesign(offdesign)?;
    }

    Ok(())
}

fn validate_offdesign(od: &OffdesignDef) -> Result<(), ValidationError> {
    let axes = [
        ("offdesign.T_hs_ff", od.t_hs_ff_start, od.t_hs_ff_end, od.t_hs_ff_steps),
        (
            "offdesign.T_cons_ff",
            od.t_cons_ff_start,
            od.t_cons_ff_end,
            od.t_cons_ff_steps,
        ),
        ("offdesign.partload", od.partload_min, od.partload_max, od.partload_steps),
    ];
    for (field, start, end, steps) in axes {
        if steps == 0 {
            return Err(invalid(&format!("{field}_steps"), steps, "must be at least 1"));
        }
        if !(start.is_finite() && end.is_finite()) || start > end {
            return Err(invalid(
                field,
                format!("{start}..{end}"),
                "range must be finite and ascending",
            ));
        }
    }
    if od.partload_min <= 0.0 {
        return Err(invalid(
            "offdesign.partload_min",
            od.partload_min,
            "load fraction must be positive",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;
    use std::collections::BTreeMap;

    fn stream(t: f64, p: f64) -> StreamDef {
        StreamDef { t, p: Some(p) }
    }

    fn params() -> Params {
        Params {
            setup: SetupDef {
                kind: "simple".into(),
                name: None,
                refrig: Some("R1234ZE(E)".into()),
                refrig1: None,
                refrig2: None,
                econ: None,
            },
            fluids: FluidsDef {
                wf: Some("R1234ze(E)".into()),
                wf1: None,
                wf2: None,
                si: "water".into(),
                so: "water".into(),
            },
            b1: stream(25.0, 1.0),
            b2: stream(15.0, 1.0),
            c0: stream(40.0, 10.0),
            c3: stream(70.0, 10.0),
            a0: None,
            ambient: stream(10.0, 1.013),
            offdesign: Some(OffdesignDef {
                t_hs_ff_start: 10.0,
                t_hs_ff_end: 30.0,
                t_hs_ff_steps: 3,
                t_cons_ff_start: 60.0,
                t_cons_ff_end: 80.0,
                t_cons_ff_steps: 3,
                partload_min: 0.3,
                partload_max: 1.0,
                partload_steps: 5,
                save_results: false,
            }),
            components: BTreeMap::new(),
        }
    }

    #[test]
    fn valid_params_pass() {
        validate_params(&params()).unwrap();
    }

    #[test]
    fn sink_return_must_be_below_feed() {
        let mut p = params();
        p.c0.t = 75.0;
        let err = validate_params(&p).unwrap_err();
        assert!(matches!(err, ValidationError::TemperatureOrder { lower: "C0.T", .. }));
    }

    #[test]
    fn sink_feed_must_exceed_source_feed() {
        let mut p = params();
        p.b1.t = 70.0;
        let err = validate_params(&p).unwrap_err();
        assert!(matches!(err, ValidationError::TemperatureOrder { lower: "B1.T", .. }));
    }

    #[test]
    fn efficiency_out_of_range() {
        let mut p = params();
        p.set_value("comp", Field::EtaS, 1.3);
        let err = validate_params(&p).unwrap_err();
        assert!(err.to_string().contains("comp.eta_s"));
    }

    #[test]
    fn offdesign_bounds_checked() {
        let mut p = params();
        if let Some(od) = p.offdesign.as_mut() {
            od.partload_steps = 0;
        }
        assert!(validate_params(&p).is_err());

        let mut p = params();
        if let Some(od) = p.offdesign.as_mut() {
            od.t_cons_ff_start = 90.0;
        }
        assert!(validate_params(&p).is_err());
    }

    proptest::proptest! {
        #[test]
        fn sink_order_decides_validity(c0 in 0.0_f64..150.0, c3 in 0.0_f64..150.0) {
            let mut p = params();
            p.c0.t = c0;
            p.c3.t = c3;
            let ok = c0 < c3 && p.b1.t < c3;
            proptest::prop_assert_eq!(validate_params(&p).is_ok(), ok);
        }
    }
}
