//! Debug trigger unit.
//!
//! A shared bank of hardware triggers observed after every retired step.
//! Two kinds exist: `match6` address triggers, which fire when the step's
//! memory-access kind overlaps the configured access mask and `tdata2`
//! equals the access virtual address, and `icount` triggers, which count
//! retired instructions down and fire at zero with a pending bit so the
//! event is delivered exactly once. The configured action selects between a
//! synchronous breakpoint trap and entering debug mode.

use super::mode::PrivilegeMode;
use super::step::StepResult;

/// tdata1 type field value for a match6 trigger.
pub const TDATA1_TYPE_MATCH6: u32 = 6;
/// tdata1 type field value for an icount trigger.
pub const TDATA1_TYPE_ICOUNT: u32 = 3;

/// Bit position of the tdata1 type field.
const TYPE_SHIFT: u32 = 28;
/// Bit position of the tdata1 dmode bit.
const DMODE_SHIFT: u32 = 27;

/// What a fired trigger asks the simulator to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerAction {
    /// Raise a breakpoint exception (action 0).
    Trap,
    /// Enter debug mode and park the hart (action 1).
    EnterDebug,
}

/// Kind-specific trigger state.
#[derive(Clone, Debug)]
pub enum TriggerKind {
    /// Address match trigger.
    Match6 {
        /// VS-mode match bit (stored, unused without the H extension).
        vs: bool,
        /// VU-mode match bit (stored, unused without the H extension).
        vu: bool,
        /// Compare select bit.
        select: bool,
        /// Timing bit (before/after).
        timing: bool,
        /// Access mask: load = bit 0, store = bit 1, execute = bit 2.
        access: u32,
    },
    /// Retired-instruction count trigger.
    Icount {
        /// 14-bit down counter.
        count: u32,
        /// Fire latched but not yet delivered.
        pending: bool,
    },
    /// Cleared or unsupported type.
    Disabled,
}

/// One trigger: shared fields plus the kind.
#[derive(Clone, Debug)]
pub struct Trigger {
    kind: TriggerKind,
    dmode: bool,
    /// Match in M-mode.
    m: bool,
    /// Match in S-mode.
    s: bool,
    /// Match in U-mode.
    u: bool,
    /// Action field (0 = trap, 1 = enter debug).
    action: u32,
    tdata2: u32,
    tdata3: u32,
}

impl Trigger {
    const fn cleared() -> Self {
        Self {
            kind: TriggerKind::Disabled,
            dmode: false,
            m: false,
            s: false,
            u: false,
            action: 0,
            tdata2: 0,
            tdata3: 0,
        }
    }

    fn matches_privilege(&self, prv: PrivilegeMode) -> bool {
        match prv {
            PrivilegeMode::Machine => self.m,
            PrivilegeMode::Supervisor => self.s,
            PrivilegeMode::User => self.u,
        }
    }
}

/// The shared trigger bank.
pub struct TriggerUnit {
    elems: Vec<Trigger>,
}

impl TriggerUnit {
    /// Creates a bank of `count` cleared triggers.
    pub fn new(count: usize) -> Self {
        Self {
            elems: vec![Trigger::cleared(); count],
        }
    }

    /// Number of implemented triggers.
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// True when no triggers are implemented.
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// `tinfo` value for the selected trigger: supported types as a bitmask.
    pub fn info(&self, index: usize) -> u32 {
        if index < self.elems.len() {
            (1 << TDATA1_TYPE_MATCH6) | (1 << TDATA1_TYPE_ICOUNT)
        } else {
            1
        }
    }

    /// Reads `tdata{no+1}` of the selected trigger.
    pub fn tdata(&self, index: usize, no: usize) -> u32 {
        let Some(elem) = self.elems.get(index) else {
            return 0;
        };
        match no {
            0 => match elem.kind {
                TriggerKind::Match6 {
                    vs,
                    vu,
                    select,
                    timing,
                    access,
                } => {
                    (TDATA1_TYPE_MATCH6 << TYPE_SHIFT)
                        | (u32::from(elem.dmode) << DMODE_SHIFT)
                        | (u32::from(vs) << 24)
                        | (u32::from(vu) << 23)
                        | (u32::from(select) << 21)
                        | (u32::from(timing) << 20)
                        | (elem.action << 12)
                        | (u32::from(elem.m) << 6)
                        | (u32::from(elem.s) << 4)
                        | (u32::from(elem.u) << 3)
                        | access
                }
                TriggerKind::Icount { count, pending } => {
                    (TDATA1_TYPE_ICOUNT << TYPE_SHIFT)
                        | (u32::from(elem.dmode) << DMODE_SHIFT)
                        | ((count & 0x3FFF) << 10)
                        | (u32::from(elem.m) << 9)
                        | (u32::from(pending) << 8)
                        | (u32::from(elem.s) << 7)
                        | (u32::from(elem.u) << 6)
                        | elem.action
                }
                TriggerKind::Disabled => 0,
            },
            1 => elem.tdata2,
            2 => elem.tdata3,
            _ => 0,
        }
    }

    /// Writes `tdata{no+1}` of the selected trigger.
    pub fn set_tdata(&mut self, index: usize, no: usize, data: u32) {
        let Some(elem) = self.elems.get_mut(index) else {
            return;
        };
        match no {
            0 => {
                let dmode = (data >> DMODE_SHIFT) & 1 != 0;
                let (tdata2, tdata3) = (elem.tdata2, elem.tdata3);
                *elem = Trigger::cleared();
                elem.tdata2 = tdata2;
                elem.tdata3 = tdata3;
                elem.dmode = dmode;
                match (data >> TYPE_SHIFT) & 0xF {
                    TDATA1_TYPE_MATCH6 => {
                        elem.kind = TriggerKind::Match6 {
                            vs: (data >> 24) & 1 != 0,
                            vu: (data >> 23) & 1 != 0,
                            select: (data >> 21) & 1 != 0,
                            timing: (data >> 20) & 1 != 0,
                            access: data & 0x7,
                        };
                        elem.action = (data >> 12) & 0xF;
                        elem.m = (data >> 6) & 1 != 0;
                        elem.s = (data >> 4) & 1 != 0;
                        elem.u = (data >> 3) & 1 != 0;
                    }
                    TDATA1_TYPE_ICOUNT => {
                        elem.kind = TriggerKind::Icount {
                            count: (data >> 10) & 0x3FFF,
                            pending: (data >> 8) & 1 != 0,
                        };
                        elem.action = data & 0x3F;
                        elem.m = (data >> 9) & 1 != 0;
                        elem.s = (data >> 7) & 1 != 0;
                        elem.u = (data >> 6) & 1 != 0;
                    }
                    _ => {}
                }
            }
            1 => elem.tdata2 = data,
            2 => elem.tdata3 = data,
            _ => {}
        }
    }

    /// Observes one retired step. Returns the first firing trigger's action.
    pub fn cycle(&mut self, result: &StepResult) -> Option<TriggerAction> {
        for elem in &mut self.elems {
            if !elem.matches_privilege(result.prv) {
                continue;
            }
            let fired = match &mut elem.kind {
                TriggerKind::Match6 { access, .. } => {
                    *access & result.m_access.mask() != 0 && elem.tdata2 == result.m_vaddr
                }
                TriggerKind::Icount { count, pending } => {
                    if *count > 1 {
                        *count -= 1;
                        false
                    } else if *count == 1 {
                        *count = 0;
                        *pending = false;
                        true
                    } else {
                        let fire = *pending;
                        *pending = false;
                        fire
                    }
                }
                TriggerKind::Disabled => false,
            };
            if fired {
                return Some(if elem.action == 1 {
                    TriggerAction::EnterDebug
                } else {
                    TriggerAction::Trap
                });
            }
        }
        None
    }
}
