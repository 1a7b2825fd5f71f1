//! Descriptor-consistency properties of the register allocator, checked
//! over whole allocation sequences rather than single calls.

use compilscript_core::logger::init_logger_debug;
use compilscript_core::mips::RegisterAllocator;
use std::collections::{HashMap, HashSet};

fn assert_descriptors_mirrored(allocator: &RegisterAllocator) {
    let registers = allocator.register_descriptor();
    let addresses = allocator.address_descriptor();

    for register in registers.registers().map(str::to_string).collect::<Vec<_>>() {
        for variable in registers.variables_in(&register) {
            let entry = addresses.peek(&variable).expect("variable tracked");
            assert!(
                entry.registers.contains(&register),
                "register {register} holds {variable} but the address side disagrees"
            );
        }
    }
    for (variable, entry) in addresses.variables() {
        for register in &entry.registers {
            assert!(
                registers.contains(register, variable),
                "{variable} claims {register} but the register side disagrees"
            );
        }
    }
}

#[test]
fn register_and_address_descriptors_stay_mirrored_under_pressure() {
    init_logger_debug();
    let mut allocator = RegisterAllocator::new(Some(vec![
        "$t0".to_string(),
        "$t1".to_string(),
        "$t2".to_string(),
    ]));

    // More variables than registers, mixed reads and writes.
    for round in 0..4 {
        for name in ["a", "b", "c", "d", "e"] {
            let variable = format!("{name}{round}");
            allocator
                .get_register(&variable, round % 2 == 0, None, &[])
                .unwrap();
            assert_descriptors_mirrored(&allocator);
        }
    }

    allocator.spill_all();
    assert_descriptors_mirrored(&allocator);
}

#[test]
fn a_written_variable_stays_in_its_register_until_spilled() {
    init_logger_debug();
    let mut allocator = RegisterAllocator::new(Some(vec![
        "$t0".to_string(),
        "$t1".to_string(),
    ]));

    let (register, _, _) = allocator.get_register("x", true, None, &[]).unwrap();
    // Reads of other variables that fit in the remaining register must not
    // displace x.
    allocator.set_liveness_context(
        HashSet::from(["x".to_string()]),
        HashMap::from([("x".to_string(), 99)]),
    );
    allocator.get_register("y", false, None, &[]).unwrap();
    assert_eq!(allocator.find_register_with("x"), Some(register.as_str()));

    allocator.release_register(&register);
    assert_eq!(allocator.find_register_with("x"), None);
}

#[test]
fn dirty_values_are_never_silently_dropped() {
    init_logger_debug();
    let mut allocator = RegisterAllocator::new(Some(vec!["$t0".to_string()]));

    allocator.get_register("x", true, None, &[]).unwrap();
    // Repurposing the only register must yield a spill for dirty x ...
    let (_, spills, _) = allocator.get_register("y", true, None, &[]).unwrap();
    assert_eq!(spills.len(), 1);
    assert_eq!(spills[0].variable, "x");

    // ... and x reloads from that same slot on its next read.
    let x_slot = spills[0].spill_offset;
    let (_, spills, loads) = allocator.get_register("x", false, None, &[]).unwrap();
    assert_eq!(spills.len(), 1, "dirty y spills in turn");
    assert_eq!(spills[0].variable, "y");
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].variable, "x");
    assert_eq!(loads[0].spill_offset, x_slot);
}

#[test]
fn preferred_registers_are_honoured_when_available() {
    init_logger_debug();
    let mut allocator = RegisterAllocator::new(None);
    let preferred = vec!["$s0".to_string()];
    let (register, _, _) = allocator
        .get_register("x", true, Some(&preferred), &[])
        .unwrap();
    assert_eq!(register, "$s0");
}

#[test]
fn farthest_next_use_is_chosen_as_spill_victim() {
    init_logger_debug();
    let mut allocator = RegisterAllocator::new(Some(vec![
        "$t0".to_string(),
        "$t1".to_string(),
    ]));

    allocator.get_register("soon", true, None, &[]).unwrap(); // $t0
    allocator.get_register("later", true, None, &[]).unwrap(); // $t1

    // Both live; `later` is needed farther in the future, so it loses its
    // register first.
    allocator.set_liveness_context(
        HashSet::from(["soon".to_string(), "later".to_string()]),
        HashMap::from([("soon".to_string(), 1), ("later".to_string(), 50)]),
    );
    let (register, spills, _) = allocator.get_register("new", true, None, &[]).unwrap();
    assert_eq!(register, "$t1");
    assert_eq!(spills[0].variable, "later");
}

#[test]
fn spill_area_grows_word_by_word() {
    init_logger_debug();
    let mut allocator = RegisterAllocator::new(Some(vec!["$t0".to_string()]));
    allocator.get_register("a", true, None, &[]).unwrap();
    allocator.get_register("b", true, None, &[]).unwrap();
    allocator.get_register("c", true, None, &[]).unwrap();
    // a and b own distinct slots by now.
    assert!(allocator.spill_area_size() >= 8);
}
