//! Nil is the empty list.

use super::int_arg;
use crate::{ErrorKind, Loc, ObjType, OpResult, Ovm, Reg};

pub fn append(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let tail = vm.arg(args, 0)?;
    if !vm.is_list(tail) {
        return Err(ErrorKind::BadType);
    }
    vm.assign(Loc::Reg(r1), tail);
    Ok(())
}

pub fn at(vm: &mut Ovm, _r1: Reg, args: &[Reg]) -> OpResult {
    int_arg(vm, args, 0)?;
    Err(ErrorKind::Range)
}

pub fn eq(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let other = vm.arg(args, 0)?;
    vm.make_bool(Loc::Reg(r1), other.is_none());
    Ok(())
}

pub fn filter(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    vm.put(Loc::Reg(r1), None);
    Ok(())
}

pub fn hash(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    vm.make_int(Loc::Reg(r1), 0);
    Ok(())
}

pub fn reverse(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    vm.put(Loc::Reg(r1), None);
    Ok(())
}

pub fn size(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    vm.make_int(Loc::Reg(r1), 0);
    Ok(())
}

pub fn slice(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    int_arg(vm, args, 0)?;
    int_arg(vm, args, 1)?;
    debug_assert_eq!(vm.reg_type(r1), ObjType::Nil);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{ErrorKind, ObjType, Op, Ovm, OvmCreateInfo, R0, R1, R2};

    fn vm() -> Ovm {
        Ovm::new(OvmCreateInfo::default())
    }

    #[test]
    fn test_nil_is_empty_list() {
        let mut vm = vm();
        vm.newc_nil(R0);
        vm.call(R0, Op::Size, &[]);
        assert_eq!(vm.integer_val(R0), 0);

        vm.newc_nil(R0);
        vm.call(R0, Op::Hash, &[]);
        assert_eq!(vm.integer_val(R0), 0);

        vm.newc_nil(R0);
        vm.call(R0, Op::Reverse, &[]);
        assert_eq!(vm.reg_type(R0), ObjType::Nil);
        assert_eq!(vm.errno(), None);
    }

    #[test]
    fn test_nil_append_takes_argument() {
        let mut vm = vm();
        vm.newc_nil(R0);
        vm.news(R1, "(1, 2)");
        vm.call(R0, Op::Append, &[R1]);
        assert_eq!(vm.reg(R0), vm.reg(R1));

        vm.newc_nil(R0);
        vm.newc_int(R1, 3);
        assert_eq!(vm.try_call(R0, Op::Append, &[R1]), Err(ErrorKind::BadType));
    }

    #[test]
    fn test_nil_at() {
        let mut vm = vm();
        vm.newc_nil(R0);
        vm.newc_int(R1, 0);
        assert_eq!(vm.try_call(R0, Op::At, &[R1]), Err(ErrorKind::Range));
        vm.err_clr();
        vm.newc_str(R1, "0");
        assert_eq!(vm.try_call(R0, Op::At, &[R1]), Err(ErrorKind::BadType));
    }

    #[test]
    fn test_nil_eq_and_slice() {
        let mut vm = vm();
        vm.newc_nil(R0);
        vm.newc_nil(R1);
        vm.call(R0, Op::Eq, &[R1]);
        assert!(vm.bool_val(R0));

        vm.newc_nil(R0);
        vm.newc_int(R1, 0);
        vm.call(R0, Op::Eq, &[R1]);
        assert!(!vm.bool_val(R0));

        vm.newc_nil(R0);
        vm.newc_int(R2, 2);
        vm.call(R0, Op::Slice, &[R1, R2]);
        assert_eq!(vm.reg_type(R0), ObjType::Nil);
        assert_eq!(vm.errno(), None);
    }
}
