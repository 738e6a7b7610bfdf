//! The built-in machine catalog: every type a machine document may contain,
//! in its current layout.

use crate::error::SchemaError;
use crate::schema::{FieldDef, SchemaNode, SchemaRegistry};

pub fn builtin_registry() -> Result<SchemaRegistry, SchemaError> {
    SchemaRegistry::builder().register_all(builtin_nodes()).build()
}

pub fn builtin_nodes() -> Vec<SchemaNode> {
    let mut nodes = Vec::new();
    nodes.extend(materials());
    nodes.extend(machines());
    nodes.extend(laminations());
    nodes.extend(slots());
    nodes.extend(holes());
    nodes.push(
        SchemaNode::concrete("Magnet")
            .since(2)
            .field(FieldDef::object("mat_type", "Material", "Material"))
            .field(FieldDef::int("type_magnetization", 0))
            .field(FieldDef::float("Lmag", 0.95)),
    );
    nodes.extend(windings());
    nodes.extend(conductors());
    nodes
}

fn materials() -> Vec<SchemaNode> {
    vec![
        SchemaNode::concrete("Material")
            .field(FieldDef::str("name", "Material_default"))
            .field(FieldDef::bool("is_isotropic", false))
            .field(FieldDef::object("elec", "MatElectrical", "MatElectrical"))
            .field(FieldDef::object("mag", "MatMagnetics", "MatMagnetics"))
            .field(FieldDef::object("struct", "MatStructural", "MatStructural"))
            .field(FieldDef::object("HT", "MatHT", "MatHT"))
            .field(FieldDef::object("eco", "MatEconomical", "MatEconomical"))
            .field(FieldDef::str("desc", "Material description"))
            .field(FieldDef::str("path", "")),
        SchemaNode::concrete("MatElectrical")
            .field(FieldDef::float("rho", 1.0))
            .field(FieldDef::float("epsr", 1.0))
            .field(FieldDef::float("alpha", 1.0)),
        // Replaces the v1 `MatLamination` bundle.
        SchemaNode::concrete("MatMagnetics")
            .since(2)
            .field(FieldDef::float("mur_lin", 1.0))
            .field(FieldDef::float("Hc", 0.0))
            .field(FieldDef::float("Brm20", 0.0))
            .field(FieldDef::float("alpha_Br", 0.0))
            .field(FieldDef::float("Wlam", 0.0))
            .field(FieldDef::matrix("BH_curve")),
        SchemaNode::concrete("MatStructural")
            .field(FieldDef::float("rho", 7650.0))
            .field(FieldDef::float("Ex", 215e9))
            .field(FieldDef::float("Ey", 215e9))
            .field(FieldDef::float("Ez", 80e9))
            .field(FieldDef::float("nu_xy", 0.3))
            .field(FieldDef::float("nu_xz", 0.03))
            .field(FieldDef::float("nu_yz", 0.03))
            .field(FieldDef::float("Gxy", 0.0))
            .field(FieldDef::float("Gxz", 2e9))
            .field(FieldDef::float("Gyz", 2e9)),
        SchemaNode::concrete("MatHT")
            .field(FieldDef::float("lambda_x", 1.0))
            .field(FieldDef::float("lambda_y", 1.0))
            .field(FieldDef::float("lambda_z", 1.0))
            .field(FieldDef::float("Cp", 1.0))
            .field(FieldDef::float("alpha", 0.00393)),
        SchemaNode::concrete("MatEconomical")
            .field(FieldDef::float("cost_unit", 0.127))
            .field(FieldDef::str("unit_name", "$")),
    ]
}

fn machines() -> Vec<SchemaNode> {
    vec![
        SchemaNode::abstract_type("Machine")
            .field(FieldDef::str("name", "default_machine"))
            .field(FieldDef::str("desc", ""))
            .field(FieldDef::int("type_machine", 1))
            .field(FieldDef::object("frame", "Frame", "Frame"))
            .field(FieldDef::object("shaft", "Shaft", "Shaft")),
        SchemaNode::concrete("MachineSIPMSM")
            .extends("Machine")
            .field(FieldDef::object("stator", "Lamination", "LamSlotWind"))
            .field(FieldDef::object("rotor", "Lamination", "LamSlotMag")),
        SchemaNode::concrete("MachineIPMSM")
            .extends("Machine")
            .field(FieldDef::object("stator", "Lamination", "LamSlotWind"))
            .field(FieldDef::object("rotor", "Lamination", "LamHole")),
        SchemaNode::concrete("MachineSCIM")
            .extends("Machine")
            .field(FieldDef::object("stator", "Lamination", "LamSlotWind"))
            .field(FieldDef::object("rotor", "Lamination", "LamSquirrelCage")),
        SchemaNode::concrete("Frame")
            .field(FieldDef::float("Lfra", 0.35))
            .field(FieldDef::float("Rint", 0.2))
            .field(FieldDef::float("Rext", 0.2))
            .field(FieldDef::object("mat_type", "Material", "Material")),
        SchemaNode::concrete("Shaft")
            .field(FieldDef::float("Lshaft", 0.442))
            .field(FieldDef::object("mat_type", "Material", "Material"))
            .field(FieldDef::float("Drsh", 0.045989)),
    ]
}

fn laminations() -> Vec<SchemaNode> {
    vec![
        SchemaNode::concrete("Lamination")
            .field(FieldDef::float("L1", 0.35))
            .field(FieldDef::object("mat_type", "Material", "Material"))
            .field(FieldDef::int("Nrvd", 0))
            .field(FieldDef::float("Wrvd", 0.0))
            .field(FieldDef::float("Kf1", 0.95))
            .field(FieldDef::bool("is_internal", true))
            .field(FieldDef::float("Rint", 0.0))
            .field(FieldDef::float("Rext", 1.0))
            .field(FieldDef::bool("is_stator", true))
            .field(FieldDef::list("axial_vent", "Hole")),
        SchemaNode::concrete("LamSlot")
            .extends("Lamination")
            .field(FieldDef::object("slot", "Slot", "SlotW11")),
        SchemaNode::concrete("LamSlotWind")
            .extends("LamSlot")
            .field(FieldDef::float("Ksfill", 0.0).or_null())
            .field(FieldDef::optional("winding", "Winding")),
        SchemaNode::concrete("LamSquirrelCage")
            .extends("LamSlotWind")
            .field(FieldDef::float("Hscr", 0.03))
            .field(FieldDef::float("Lscr", 0.015))
            .field(FieldDef::object("ring_mat", "Material", "Material")),
        SchemaNode::concrete("LamSlotMag")
            .extends("LamSlot")
            .since(2)
            .field(FieldDef::object("magnet", "Magnet", "Magnet")),
        SchemaNode::concrete("LamHole")
            .extends("Lamination")
            .field(FieldDef::list("hole", "Hole")),
    ]
}

fn slots() -> Vec<SchemaNode> {
    let mut nodes = vec![
        SchemaNode::abstract_type("Slot").field(FieldDef::int("Zs", 36)),
        SchemaNode::concrete("SlotW11")
            .extends("Slot")
            .field(FieldDef::float("W0", 0.003))
            .field(FieldDef::float("H0", 0.003))
            .field(FieldDef::float("H1", 0.0))
            .field(FieldDef::bool("H1_is_rad", false))
            .field(FieldDef::float("W1", 0.013))
            .field(FieldDef::float("H2", 0.02))
            .field(FieldDef::float("W2", 0.01))
            .field(FieldDef::float("R1", 0.001)),
        SchemaNode::concrete("SlotW21")
            .extends("Slot")
            .field(FieldDef::float("W0", 0.003))
            .field(FieldDef::float("H0", 0.003))
            .field(FieldDef::float("H1", 0.0))
            .field(FieldDef::bool("H1_is_rad", false))
            .field(FieldDef::float("W1", 0.013))
            .field(FieldDef::float("H2", 0.02))
            .field(FieldDef::float("W2", 0.01)),
        // Opening (W0, H0) and magnet footprint (W1, H1).
        SchemaNode::abstract_type("SlotMag")
            .extends("Slot")
            .since(2)
            .field(FieldDef::float("W0", 0.0122))
            .field(FieldDef::float("H0", 0.001))
            .field(FieldDef::float("W1", 0.0122))
            .field(FieldDef::float("H1", 0.001)),
    ];
    for name in ["SlotM10", "SlotM11", "SlotM12"] {
        nodes.push(SchemaNode::concrete(name).extends("SlotMag").since(2));
    }
    for name in ["SlotM13", "SlotM14"] {
        nodes.push(
            SchemaNode::concrete(name)
                .extends("SlotMag")
                .since(2)
                .field(FieldDef::float("Rtopm", 0.001)),
        );
    }
    nodes
}

fn holes() -> Vec<SchemaNode> {
    vec![
        SchemaNode::abstract_type("Hole")
            .field(FieldDef::int("Zh", 8))
            .field(FieldDef::object("mat_void", "Material", "Material")),
        SchemaNode::abstract_type("HoleMag").extends("Hole"),
        SchemaNode::concrete("HoleM50")
            .extends("HoleMag")
            .field(FieldDef::float("H0", 0.01096))
            .field(FieldDef::float("W0", 0.042))
            .field(FieldDef::float("H1", 0.0015))
            .field(FieldDef::float("W1", 0.0))
            .field(FieldDef::float("H2", 0.001))
            .field(FieldDef::float("W2", 0.0))
            .field(FieldDef::float("H3", 0.0065))
            .field(FieldDef::float("W3", 0.014))
            .field(FieldDef::float("H4", 0.0))
            .field(FieldDef::float("W4", 0.0189))
            .field(FieldDef::object("magnet_0", "Magnet", "Magnet"))
            .field(FieldDef::object("magnet_1", "Magnet", "Magnet")),
        SchemaNode::concrete("VentilationCirc")
            .extends("Hole")
            .field(FieldDef::float("Alpha0", 0.0))
            .field(FieldDef::float("D0", 0.01))
            .field(FieldDef::float("H0", 0.1)),
        SchemaNode::concrete("VentilationPolar")
            .extends("Hole")
            .field(FieldDef::float("Alpha0", 0.0))
            .field(FieldDef::float("D0", 0.01))
            .field(FieldDef::float("H0", 0.1))
            .field(FieldDef::float("W1", 0.1)),
    ]
}

fn windings() -> Vec<SchemaNode> {
    let mut nodes = vec![
        SchemaNode::abstract_type("Winding")
            .since(3)
            .field(FieldDef::bool("is_reverse_wind", false))
            .field(FieldDef::int("Nslot_shift_wind", 0))
            .field(FieldDef::int("qs", 3))
            .field(FieldDef::int("Ntcoil", 7))
            .field(FieldDef::int("Npcp", 2))
            .field(FieldDef::int("type_connection", 0))
            .field(FieldDef::int("p", 3))
            .field(FieldDef::float("Lewout", 0.065))
            .field(FieldDef::object("conductor", "Conductor", "CondType12")),
    ];
    for name in ["WindingCW1L", "WindingCW2LT", "WindingCW2LR", "WindingSC"] {
        nodes.push(SchemaNode::concrete(name).extends("Winding").since(3));
    }
    for name in ["WindingDW1L", "WindingDW2L"] {
        nodes.push(
            SchemaNode::concrete(name)
                .extends("Winding")
                .since(3)
                .field(FieldDef::int("coil_pitch", 5)),
        );
    }
    nodes.push(
        SchemaNode::concrete("WindingUD")
            .extends("Winding")
            .since(3)
            .field(FieldDef::matrix("wind_mat")),
    );
    nodes
}

fn conductors() -> Vec<SchemaNode> {
    vec![
        SchemaNode::abstract_type("Conductor")
            .field(FieldDef::object("cond_mat", "Material", "Material"))
            .field(FieldDef::object("ins_mat", "Material", "Material")),
        SchemaNode::concrete("CondType11")
            .extends("Conductor")
            .field(FieldDef::float("Hwire", 0.002))
            .field(FieldDef::float("Wwire", 0.01))
            .field(FieldDef::int("Nwppc_tan", 1))
            .field(FieldDef::int("Nwppc_rad", 1))
            .field(FieldDef::float("Wins_wire", 0.0)),
        SchemaNode::concrete("CondType12")
            .extends("Conductor")
            .field(FieldDef::float("Wwire", 0.015))
            .field(FieldDef::float("Wins_cond", 0.015))
            .field(FieldDef::int("Nwppc", 1))
            .field(FieldDef::float("Wins_wire", 0.0))
            .field(FieldDef::float("Kwoh", 0.5)),
    ]
}
