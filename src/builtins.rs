//! Built-in parametric element types.
//!
//! | Type               | Default method                | Other methods              |
//! |--------------------|-------------------------------|----------------------------|
//! | `Parameter`        | `value(value)`                |                            |
//! | `CoordinateSystem` | `fromOrigin(x, y, z)`         | `fromPoint(point)`         |
//! | `Point`            | `fromCoordinates(cs, x, y, z)`| `offset(from, dx, dy, dz)` |
//! | `Line`             | `between(start, end)`         |                            |

use crate::update::{MethodRegistry, UpdateArgs};
use crate::value::{Properties, Value, distance};

pub const PARAMETER: &str = "Parameter";
pub const COORDINATE_SYSTEM: &str = "CoordinateSystem";
pub const POINT: &str = "Point";
pub const LINE: &str = "Line";

/// Register every built-in type.
pub fn register_builtins(registry: &mut MethodRegistry) {
    registry.register_default(PARAMETER, "value", &["value"], |args| {
        let mut out = Properties::new();
        out.insert("value".into(), args.get("value")?.clone());
        Ok(out)
    });

    registry.register_default(COORDINATE_SYSTEM, "fromOrigin", &["x", "y", "z"], |args| {
        let origin = [args.number("x")?, args.number("y")?, args.number("z")?];
        Ok(origin_state(origin))
    });
    registry.register(COORDINATE_SYSTEM, "fromPoint", &["point"], |args| {
        Ok(origin_state(args.point("point")?))
    });

    registry.register_default(POINT, "fromCoordinates", &["cs", "x", "y", "z"], |args| {
        let o = args.point("cs")?;
        let p = [
            o[0] + args.number("x")?,
            o[1] + args.number("y")?,
            o[2] + args.number("z")?,
        ];
        Ok(point_state(p))
    });
    registry.register(POINT, "offset", &["from", "dx", "dy", "dz"], offset);

    registry.register_default(LINE, "between", &["start", "end"], |args| {
        let a = args.point("start")?;
        let b = args.point("end")?;
        let mut out = Properties::new();
        out.insert("start".into(), Value::from(a));
        out.insert("end".into(), Value::from(b));
        out.insert("length".into(), Value::Number(distance(a, b)));
        Ok(out)
    });
}

fn offset(args: &UpdateArgs) -> anyhow::Result<Properties> {
    let from = args.point("from")?;
    let p = [
        from[0] + args.number("dx")?,
        from[1] + args.number("dy")?,
        from[2] + args.number("dz")?,
    ];
    Ok(point_state(p))
}

fn origin_state(origin: [f64; 3]) -> Properties {
    let mut out = Properties::new();
    out.insert("origin".into(), Value::from(origin));
    out
}

fn point_state(p: [f64; 3]) -> Properties {
    let mut out = Properties::new();
    out.insert("position".into(), Value::from(p));
    out.insert("x".into(), Value::Number(p[0]));
    out.insert("y".into(), Value::Number(p[1]));
    out.insert("z".into(), Value::Number(p[2]));
    out
}
