use log::info;

use backlot_vm::{OpcodeExecutor, Scheduler, StepOutcome, VmError};

/// Demo instruction set: one opcode byte, little-endian 16-bit operands.
/// Small on purpose; the scheduler does not care how rich the ISA is.
pub mod op {
    pub const END: u8 = 0x00;
    pub const BREAK: u8 = 0x01;
    /// ticks u16
    pub const DELAY: u8 = 0x02;
    /// flags u8 (bit0 freeze-resistant, bit1 recursive), script u16,
    /// argc u8, argc * i16 args
    pub const START_SCRIPT: u8 = 0x03;
    /// script u16
    pub const STOP_SCRIPT: u8 = 0x04;
    /// flags u8, object u16, entry u8, argc u8, argc * i16 args
    pub const START_OBJECT: u8 = 0x05;
    /// object u16
    pub const STOP_OBJECT: u8 = 0x06;
    /// data i16
    pub const CUTSCENE: u8 = 0x07;
    pub const END_CUTSCENE: u8 = 0x08;
    /// flags u8 (bit0 include freeze-resistant slots)
    pub const FREEZE: u8 = 0x09;
    pub const UNFREEZE: u8 = 0x0a;
    /// verb u8, object_a u16, object_b u16, flags u8 (bit0 preposition)
    pub const DO_SENTENCE: u8 = 0x0b;
    /// local u8, value i16
    pub const SET_LOCAL: u8 = 0x0c;
    /// local u8, value i16
    pub const ADD_LOCAL: u8 = 0x0d;
    /// target u16
    pub const JUMP: u8 = 0x0e;
    /// local u8, target u16
    pub const JUMP_IF_ZERO: u8 = 0x0f;
    /// local u8; stores 1 if a cutscene abort happened since the last poll
    pub const POLL_OVERRIDE: u8 = 0x10;
    /// len u8, len utf-8 bytes
    pub const PRINT: u8 = 0x11;
}

pub const FLAG_FREEZE_RESISTANT: u8 = 0x01;
pub const FLAG_RECURSIVE: u8 = 0x02;
pub const FLAG_INCLUDE_RESISTANT: u8 = 0x01;
pub const FLAG_PREPOSITION: u8 = 0x01;

/// Opcode executor for the demo ISA. Collects `PRINT` output so the host
/// can show a transcript after the run.
#[derive(Debug, Default)]
pub struct DemoExecutor {
    pub messages: Vec<String>,
}

impl DemoExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_args(vm: &mut Scheduler) -> Result<Vec<i32>, VmError> {
        let argc = vm.read_byte()? as usize;
        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            args.push(vm.read_word()? as i16 as i32);
        }
        Ok(args)
    }
}

impl OpcodeExecutor for DemoExecutor {
    fn step(&mut self, vm: &mut Scheduler) -> Result<StepOutcome, VmError> {
        let index = match vm.current_slot() {
            Some(index) => index,
            None => return Err(VmError::Script("step without a current slot".into())),
        };
        let (number, offset) = {
            let slot = vm.slot(index);
            (slot.number, slot.pc)
        };
        let opcode = vm.read_byte()?;
        match opcode {
            op::END => Ok(StepOutcome::Terminate),
            op::BREAK => Ok(StepOutcome::Yield),
            op::DELAY => {
                let ticks = vm.read_word()? as u32;
                vm.delay_current(ticks)?;
                Ok(StepOutcome::Continue)
            }
            op::START_SCRIPT => {
                let flags = vm.read_byte()?;
                let script = vm.read_word()?;
                let args = Self::read_args(vm)?;
                vm.run_script(
                    self,
                    script,
                    &args,
                    flags & FLAG_FREEZE_RESISTANT != 0,
                    flags & FLAG_RECURSIVE != 0,
                )?;
                Ok(StepOutcome::Continue)
            }
            op::STOP_SCRIPT => {
                let script = vm.read_word()?;
                vm.stop_script(script)?;
                Ok(StepOutcome::Continue)
            }
            op::START_OBJECT => {
                let flags = vm.read_byte()?;
                let object = vm.read_word()?;
                let entry = vm.read_byte()?;
                let args = Self::read_args(vm)?;
                vm.run_object_script(
                    self,
                    object,
                    entry,
                    &args,
                    flags & FLAG_FREEZE_RESISTANT != 0,
                    flags & FLAG_RECURSIVE != 0,
                )?;
                Ok(StepOutcome::Continue)
            }
            op::STOP_OBJECT => {
                let object = vm.read_word()?;
                vm.stop_object_script(object)?;
                Ok(StepOutcome::Continue)
            }
            op::CUTSCENE => {
                let data = vm.read_word()? as i16 as i32;
                vm.begin_cutscene(self, data)?;
                Ok(StepOutcome::Continue)
            }
            op::END_CUTSCENE => {
                vm.end_cutscene(self)?;
                Ok(StepOutcome::Continue)
            }
            op::FREEZE => {
                let flags = vm.read_byte()?;
                vm.freeze_scripts(flags & FLAG_INCLUDE_RESISTANT != 0);
                Ok(StepOutcome::Continue)
            }
            op::UNFREEZE => {
                vm.unfreeze_scripts();
                Ok(StepOutcome::Continue)
            }
            op::DO_SENTENCE => {
                let verb = vm.read_byte()?;
                let object_a = vm.read_word()?;
                let object_b = vm.read_word()?;
                let flags = vm.read_byte()?;
                vm.enqueue_sentence(verb, object_a, object_b, flags & FLAG_PREPOSITION != 0);
                Ok(StepOutcome::Continue)
            }
            op::SET_LOCAL => {
                let local = vm.read_byte()? as usize;
                let value = vm.read_word()? as i16 as i32;
                vm.set_current_local(local, value)?;
                Ok(StepOutcome::Continue)
            }
            op::ADD_LOCAL => {
                let local = vm.read_byte()? as usize;
                let value = vm.read_word()? as i16 as i32;
                let current = vm.current_local(local)?;
                vm.set_current_local(local, current.wrapping_add(value))?;
                Ok(StepOutcome::Continue)
            }
            op::JUMP => {
                let target = vm.read_word()? as usize;
                vm.jump(target)?;
                Ok(StepOutcome::Continue)
            }
            op::JUMP_IF_ZERO => {
                let local = vm.read_byte()? as usize;
                let target = vm.read_word()? as usize;
                if vm.current_local(local)? == 0 {
                    vm.jump(target)?;
                }
                Ok(StepOutcome::Continue)
            }
            op::POLL_OVERRIDE => {
                let local = vm.read_byte()? as usize;
                let hit = vm.take_override_hit();
                vm.set_current_local(local, hit as i32)?;
                Ok(StepOutcome::Continue)
            }
            op::PRINT => {
                let len = vm.read_byte()? as usize;
                let mut bytes = Vec::with_capacity(len);
                for _ in 0..len {
                    bytes.push(vm.read_byte()?);
                }
                let text = String::from_utf8_lossy(&bytes).into_owned();
                info!("script {number}: {text}");
                self.messages.push(text);
                Ok(StepOutcome::Continue)
            }
            opcode => Err(VmError::UnknownOpcode {
                opcode,
                offset,
                number,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{op, DemoExecutor, FLAG_PREPOSITION, FLAG_RECURSIVE};
    use backlot_vm::{InMemoryStore, Scheduler, ScriptStatus, VmConfig};

    fn vm_with(scripts: &[(u16, Vec<u8>)]) -> Scheduler {
        let mut store = InMemoryStore::new();
        for (number, code) in scripts {
            store.insert_global(*number, code.clone());
        }
        Scheduler::new(VmConfig::default(), Box::new(store))
    }

    #[test]
    fn locals_arithmetic_and_conditional_jump() {
        // local0 = 3; loop: add -1 until zero, breaking each turn.
        let program = vec![
            op::SET_LOCAL, 0, 3, 0, // 0..4
            op::JUMP_IF_ZERO, 0, 16, 0, // 4..8
            op::ADD_LOCAL, 0, 0xff, 0xff, // 8..12: add -1
            op::BREAK,      // 12
            op::JUMP, 4, 0, // 13..16
            op::END,        // 16
        ];

        let mut vm = vm_with(&[(8, program)]);
        let mut exec = DemoExecutor::new();
        vm.run_script(&mut exec, 8, &[], false, false).unwrap();
        assert_eq!(vm.slot(1).locals[0], 2);
        vm.run_tick(&mut exec).unwrap();
        assert_eq!(vm.slot(1).locals[0], 1);
        vm.run_tick(&mut exec).unwrap();
        vm.run_tick(&mut exec).unwrap();
        assert!(vm.slot(1).is_dead(), "loop must fall through to END");
    }

    #[test]
    fn print_collects_a_transcript() {
        let program = vec![op::PRINT, 2, b'h', b'i', op::END];
        let mut vm = vm_with(&[(8, program)]);
        let mut exec = DemoExecutor::new();
        vm.run_script(&mut exec, 8, &[], false, false).unwrap();
        assert_eq!(exec.messages, vec!["hi".to_string()]);
    }

    #[test]
    fn do_sentence_feeds_the_queue() {
        let program = vec![
            op::DO_SENTENCE, 3, 44, 1, 0, 0, FLAG_PREPOSITION,
            op::END,
        ];
        let mut vm = vm_with(&[(8, program)]);
        let mut exec = DemoExecutor::new();
        vm.run_script(&mut exec, 8, &[], false, false).unwrap();
        let pending = vm.pending_sentences();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].verb, 3);
        assert_eq!(pending[0].object_a, 300);
        assert!(pending[0].preposition);
    }

    #[test]
    fn poll_override_observes_a_cutscene_abort() {
        // Open a cutscene, then spin: poll the flag into local0 each turn
        // and yield while it reads zero.
        let program = vec![
            op::CUTSCENE, 0, 0, // 0..3
            op::POLL_OVERRIDE, 0, // 3..5
            op::JUMP_IF_ZERO, 0, 10, 0, // 5..9: loop while not aborted
            op::END, // 9
            op::BREAK, // 10
            op::JUMP, 3, 0, // 11..14
        ];
        let mut vm = vm_with(&[(8, program)]);
        let mut exec = DemoExecutor::new();
        vm.run_script(&mut exec, 8, &[], false, false).unwrap();
        assert_eq!(vm.slot(1).status, ScriptStatus::Running);

        assert!(vm.abort_cutscene());
        vm.run_tick(&mut exec).unwrap();
        // The abort rewound the slot to the poll loop; the next poll reads 1
        // and the script runs off to END.
        assert!(vm.slot(1).is_dead());
    }

    #[test]
    fn add_local_wraps_on_overflow() {
        // Accumulate 4 * 32767 additions of 32767 into local0; the running
        // sum passes i32::MAX partway through and must wrap, not trap.
        let program = vec![
            op::SET_LOCAL, 1, 4, 0, // 0: outer = 4
            op::SET_LOCAL, 2, 0xff, 0x7f, // 4: inner = 32767
            op::ADD_LOCAL, 0, 0xff, 0x7f, // 8: acc += 32767
            op::ADD_LOCAL, 2, 0xff, 0xff, // 12: inner -= 1
            op::JUMP_IF_ZERO, 2, 23, 0, // 16
            op::JUMP, 8, 0, // 20
            op::ADD_LOCAL, 1, 0xff, 0xff, // 23: outer -= 1
            op::JUMP_IF_ZERO, 1, 34, 0, // 27
            op::JUMP, 4, 0, // 31
            op::BREAK, // 34
        ];
        let mut vm = vm_with(&[(8, program)]);
        let mut exec = DemoExecutor::new();
        vm.run_script(&mut exec, 8, &[], false, false).unwrap();

        let slot = vm.slot(1);
        assert_eq!(slot.status, ScriptStatus::Running);
        let expected = (4i64 * 32767 * 32767) as u32 as i32;
        assert_eq!(slot.locals[0], expected);
        assert!(expected < 0, "the sum really did wrap");
    }

    #[test]
    fn nested_start_passes_arguments() {
        let caller = vec![
            op::START_SCRIPT, FLAG_RECURSIVE, 9, 0, 2, 7, 0, 9, 0, // args [7, 9]
            op::END,
        ];
        let callee = vec![op::BREAK, op::END];
        let mut vm = vm_with(&[(8, caller), (9, callee)]);
        let mut exec = DemoExecutor::new();
        vm.run_script(&mut exec, 8, &[], false, false).unwrap();
        let slot = vm
            .slots()
            .iter()
            .find(|slot| slot.number == 9)
            .expect("callee slot");
        assert_eq!(&slot.locals[..2], &[7, 9]);
    }
}
