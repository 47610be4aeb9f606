//! Builtin IR library.
//!
//! Every builtin member path resolves to a definition here. Members of
//! container types are templates keyed with `$<i>` holes
//! (`__vallum__list[$0]__map[$1]`); the definition builder fills the holes
//! when it meets a concrete instance name. The text is parsed once, on first
//! use.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::compile::CompilerError;
use crate::ir::IrExpr;
use crate::ir_parse::parse_definitions;
use crate::members::{self, record_fields, HASH_TYPES};
use crate::types::{member_path, BuiltinType, Type};

const COMMON: &str = r#"
__vallum__common__not = (b) -> { __core__ifThenElse(b, false, true) };
__vallum__common__and = (a, b) -> { __core__ifThenElse(a, b, () -> { false })() };

__vallum__common__is_constr = (d) -> {
    __core__chooseData(d, () -> { true }, () -> { false }, () -> { false }, () -> { false }, () -> { false })()
};
__vallum__common__is_map = (d) -> {
    __core__chooseData(d, () -> { false }, () -> { true }, () -> { false }, () -> { false }, () -> { false })()
};
__vallum__common__is_list = (d) -> {
    __core__chooseData(d, () -> { false }, () -> { false }, () -> { true }, () -> { false }, () -> { false })()
};
__vallum__common__is_int = (d) -> {
    __core__chooseData(d, () -> { false }, () -> { false }, () -> { false }, () -> { true }, () -> { false })()
};
__vallum__common__is_bytes = (d) -> {
    __core__chooseData(d, () -> { false }, () -> { false }, () -> { false }, () -> { false }, () -> { true })()
};

__vallum__common__list_get = (lst, i) -> {
    __core__ifThenElse(
        __core__equalsInteger(i, 0),
        () -> { __core__headList(lst) },
        () -> { __vallum__common__list_get(__core__tailList(lst), __core__subtractInteger(i, 1)) }
    )()
};
__vallum__common__field = (self, i) -> {
    __vallum__common__list_get(__core__sndPair(__core__unConstrData(self)), i)
};
__vallum__common__list_length = (lst) -> {
    __core__chooseList(
        lst,
        () -> { 0 },
        () -> { __core__addInteger(__vallum__common__list_length(__core__tailList(lst)), 1) }
    )()
};
__vallum__common__list_all = (lst, pred) -> {
    __core__chooseList(lst, () -> { true }, () -> {
        __core__ifThenElse(
            pred(__core__headList(lst)),
            () -> { __vallum__common__list_all(__core__tailList(lst), pred) },
            () -> { false }
        )()
    })()
};
__vallum__common__list_any = (lst, pred) -> {
    __core__chooseList(lst, () -> { false }, () -> {
        __core__ifThenElse(
            pred(__core__headList(lst)),
            () -> { true },
            () -> { __vallum__common__list_any(__core__tailList(lst), pred) }
        )()
    })()
};
__vallum__common__list_append = (a, b) -> {
    __core__chooseList(a, () -> { b }, () -> {
        __core__mkCons(__core__headList(a), __vallum__common__list_append(__core__tailList(a), b))
    })()
};
// keeps the input's nil so pair lists stay pair lists
__vallum__common__list_filter = (lst, pred) -> {
    __core__chooseList(lst, () -> { lst }, () -> {
        (x, rest) -> {
            __core__ifThenElse(pred(x), () -> { __core__mkCons(x, rest) }, () -> { rest })()
        }(__core__headList(lst), __vallum__common__list_filter(__core__tailList(lst), pred))
    })()
};
__vallum__common__list_map = (lst, f) -> {
    __core__chooseList(lst, () -> { __core__mkNilData(()) }, () -> {
        __core__mkCons(f(__core__headList(lst)), __vallum__common__list_map(__core__tailList(lst), f))
    })()
};
__vallum__common__list_find = (lst, pred) -> {
    __core__chooseList(lst, () -> { error("no matching item") }, () -> {
        (x) -> {
            __core__ifThenElse(pred(x), () -> { x }, () -> { __vallum__common__list_find(__core__tailList(lst), pred) })()
        }(__core__headList(lst))
    })()
};
__vallum__common__list_find_safe = (lst, pred) -> {
    __core__chooseList(lst, () -> { __core__constrData(1, __core__mkNilData(())) }, () -> {
        (x) -> {
            __core__ifThenElse(
                pred(x),
                () -> { __core__constrData(0, __core__mkCons(x, __core__mkNilData(()))) },
                () -> { __vallum__common__list_find_safe(__core__tailList(lst), pred) }
            )()
        }(__core__headList(lst))
    })()
};
__vallum__common__list_fold = (lst, f, z) -> {
    __core__chooseList(lst, () -> { z }, () -> {
        __vallum__common__list_fold(__core__tailList(lst), f, f(z, __core__headList(lst)))
    })()
};
__vallum__common__list_repeat = (n, x) -> {
    __core__ifThenElse(
        __core__lessThanEqualsInteger(n, 0),
        () -> { __core__mkNilData(()) },
        () -> { __core__mkCons(x, __vallum__common__list_repeat(__core__subtractInteger(n, 1), x)) }
    )()
};

__vallum__common__map_lookup = (entries, key) -> {
    __core__chooseList(entries, () -> { error("key not found") }, () -> {
        (p) -> {
            __core__ifThenElse(
                __core__equalsData(__core__fstPair(p), key),
                () -> { __core__sndPair(p) },
                () -> { __vallum__common__map_lookup(__core__tailList(entries), key) }
            )()
        }(__core__headList(entries))
    })()
};
__vallum__common__map_lookup_or = (entries, key, dflt) -> {
    __core__chooseList(entries, () -> { dflt }, () -> {
        (p) -> {
            __core__ifThenElse(
                __core__equalsData(__core__fstPair(p), key),
                () -> { __core__sndPair(p) },
                () -> { __vallum__common__map_lookup_or(__core__tailList(entries), key, dflt) }
            )()
        }(__core__headList(entries))
    })()
};
__vallum__common__map_lookup_safe = (entries, key) -> {
    __core__chooseList(entries, () -> { __core__constrData(1, __core__mkNilData(())) }, () -> {
        (p) -> {
            __core__ifThenElse(
                __core__equalsData(__core__fstPair(p), key),
                () -> { __core__constrData(0, __core__mkCons(__core__sndPair(p), __core__mkNilData(()))) },
                () -> { __vallum__common__map_lookup_safe(__core__tailList(entries), key) }
            )()
        }(__core__headList(entries))
    })()
};
__vallum__common__map_find_valid = (entries, key, pred) -> {
    __core__chooseList(entries, () -> { false }, () -> {
        (p) -> {
            __core__ifThenElse(
                __core__equalsData(__core__fstPair(p), key),
                () -> { pred(__core__sndPair(p)) },
                () -> { __vallum__common__map_find_valid(__core__tailList(entries), key, pred) }
            )()
        }(__core__headList(entries))
    })()
};
__vallum__common__cip68_get = (self, tag) -> {
    __vallum__common__map_lookup(
        __core__unMapData(__core__headList(__core__sndPair(__core__unConstrData(self)))),
        __core__bData(tag)
    )
};

__vallum__common__nat_show = (n) -> {
    (digit) -> {
        __core__ifThenElse(
            __core__lessThanInteger(n, 10),
            () -> { digit },
            () -> { __core__appendString(__vallum__common__nat_show(__core__divideInteger(n, 10)), digit) }
        )()
    }(__core__decodeUtf8(__core__consByteString(__core__addInteger(48, __core__modInteger(n, 10)), #)))
};
__vallum__common__int_show = (n) -> {
    __core__ifThenElse(
        __core__lessThanInteger(n, 0),
        () -> { __core__appendString("-", __vallum__common__nat_show(__core__subtractInteger(0, n))) },
        () -> { __vallum__common__nat_show(n) }
    )()
};
__vallum__common__hex_digit = (d) -> {
    __core__ifThenElse(__core__lessThanInteger(d, 10), () -> { __core__addInteger(d, 48) }, () -> { __core__addInteger(d, 87) })()
};
__vallum__common__hex = (b) -> {
    __core__ifThenElse(__core__equalsInteger(__core__lengthOfByteString(b), 0), () -> { # }, () -> {
        (x) -> {
            __core__consByteString(
                __vallum__common__hex_digit(__core__divideInteger(x, 16)),
                __core__consByteString(
                    __vallum__common__hex_digit(__core__modInteger(x, 16)),
                    __vallum__common__hex(__core__sliceByteString(1, __core__subtractInteger(__core__lengthOfByteString(b), 1), b))
                )
            )
        }(__core__indexByteString(b, 0))
    })()
};
__vallum__common__bytes_show = (b) -> { __core__decodeUtf8(__vallum__common__hex(b)) };
__vallum__common__value_get = (v, mph, name) -> {
    __core__unIData(
        __vallum__common__map_lookup_or(
            __core__unMapData(
                __vallum__common__map_lookup_or(
                    __core__unMapData(v),
                    __core__bData(mph),
                    __core__mapData(__core__mkNilPairData(()))
                )
            ),
            __core__bData(name),
            __core__iData(0)
        )
    )
};
"#;

const SCALARS: &str = r#"
__vallum__int____add = (self) -> { (other) -> { __core__addInteger(self, other) } };
__vallum__int____sub = (self) -> { (other) -> { __core__subtractInteger(self, other) } };
__vallum__int____mul = (self) -> { (other) -> { __core__multiplyInteger(self, other) } };
__vallum__int____div = (self) -> { (other) -> { __core__divideInteger(self, other) } };
__vallum__int____mod = (self) -> { (other) -> { __core__modInteger(self, other) } };
__vallum__int____lt = (self) -> { (other) -> { __core__lessThanInteger(self, other) } };
__vallum__int____leq = (self) -> { (other) -> { __core__lessThanEqualsInteger(self, other) } };
__vallum__int____gt = (self) -> { (other) -> { __core__lessThanInteger(other, self) } };
__vallum__int____geq = (self) -> { (other) -> { __core__lessThanEqualsInteger(other, self) } };
__vallum__int____neg = (self) -> { __core__subtractInteger(0, self) };
__vallum__int__abs = (self) -> {
    () -> { __core__ifThenElse(__core__lessThanInteger(self, 0), () -> { __core__subtractInteger(0, self) }, () -> { self })() }
};
__vallum__int__show = (self) -> { () -> { __vallum__common__int_show(self) } };
__vallum__int__to_bool = (self) -> { () -> { __vallum__common__not(__core__equalsInteger(self, 0)) } };
__vallum__int__to_real = (self) -> { () -> { __core__multiplyInteger(self, 1000000) } };
__vallum__int__min = (a, b) -> { __core__ifThenElse(__core__lessThanInteger(a, b), a, b) };
__vallum__int__max = (a, b) -> { __core__ifThenElse(__core__lessThanInteger(a, b), b, a) };

__vallum__real____add = (self) -> { (other) -> { __core__addInteger(self, other) } };
__vallum__real____sub = (self) -> { (other) -> { __core__subtractInteger(self, other) } };
__vallum__real____mul = (self) -> {
    (other) -> { __core__divideInteger(__core__multiplyInteger(self, other), 1000000) }
};
__vallum__real____div = (self) -> {
    (other) -> { __core__divideInteger(__core__multiplyInteger(self, 1000000), other) }
};
__vallum__real____lt = (self) -> { (other) -> { __core__lessThanInteger(self, other) } };
__vallum__real____leq = (self) -> { (other) -> { __core__lessThanEqualsInteger(self, other) } };
__vallum__real____gt = (self) -> { (other) -> { __core__lessThanInteger(other, self) } };
__vallum__real____geq = (self) -> { (other) -> { __core__lessThanEqualsInteger(other, self) } };
__vallum__real____neg = (self) -> { __core__subtractInteger(0, self) };
__vallum__real__floor = (self) -> { () -> { __core__divideInteger(self, 1000000) } };

__vallum__bool____not = (self) -> { __vallum__common__not(self) };
__vallum__bool__to_int = (self) -> { () -> { __core__ifThenElse(self, 1, 0) } };
__vallum__bool__show = (self) -> { () -> { __core__ifThenElse(self, "true", "false") } };

__vallum__string____add = (self) -> { (other) -> { __core__appendString(self, other) } };
__vallum__string__encode_utf8 = (self) -> { () -> { __core__encodeUtf8(self) } };

__vallum__bytearray____add = (self) -> { (other) -> { __core__appendByteString(self, other) } };
__vallum__bytearray__length = (self) -> { __core__lengthOfByteString(self) };
__vallum__bytearray__slice = (self) -> {
    (start, end) -> { __core__sliceByteString(start, __core__subtractInteger(end, start), self) }
};
__vallum__bytearray__sha2 = (self) -> { () -> { __core__sha2_256(self) } };
__vallum__bytearray__decode_utf8 = (self) -> { () -> { __core__decodeUtf8(self) } };
__vallum__bytearray__show = (self) -> { () -> { __vallum__common__bytes_show(self) } };
__vallum__bytearray__starts_with = (self) -> {
    (prefix) -> {
        __core__equalsByteString(__core__sliceByteString(0, __core__lengthOfByteString(prefix), self), prefix)
    }
};

__vallum__data__tag = (self) -> { __core__fstPair(__core__unConstrData(self)) };
"#;

const CONTAINERS: &str = r#"
__vallum__list[$0]____add = (self) -> { (other) -> { __vallum__common__list_append(self, other) } };
__vallum__list[$0]__length = (self) -> { __vallum__common__list_length(self) };
__vallum__list[$0]__head = (self) -> { $0__from_data(__core__headList(self)) };
__vallum__list[$0]__tail = (self) -> { __core__tailList(self) };
__vallum__list[$0]__is_empty = (self) -> { () -> { __core__nullList(self) } };
__vallum__list[$0]__get = (self) -> { (i) -> { $0__from_data(__vallum__common__list_get(self, i)) } };
__vallum__list[$0]__prepend = (self) -> { (x) -> { __core__mkCons($0____to_data(x), self) } };
__vallum__list[$0]__any = (self) -> {
    (pred) -> { __vallum__common__list_any(self, (x) -> { pred($0__from_data(x)) }) }
};
__vallum__list[$0]__all = (self) -> {
    (pred) -> { __vallum__common__list_all(self, (x) -> { pred($0__from_data(x)) }) }
};
__vallum__list[$0]__filter = (self) -> {
    (pred) -> { __vallum__common__list_filter(self, (x) -> { pred($0__from_data(x)) }) }
};
__vallum__list[$0]__find = (self) -> {
    (pred) -> { $0__from_data(__vallum__common__list_find(self, (x) -> { pred($0__from_data(x)) })) }
};
__vallum__list[$0]__find_safe = (self) -> {
    (pred) -> { __vallum__common__list_find_safe(self, (x) -> { pred($0__from_data(x)) }) }
};
__vallum__list[$0]__map[$1] = (self) -> {
    (f) -> { __vallum__common__list_map(self, (x) -> { $1____to_data(f($0__from_data(x))) }) }
};
__vallum__list[$0]__fold[$1] = (self) -> {
    (f, z) -> { __vallum__common__list_fold(self, (acc, x) -> { f(acc, $0__from_data(x)) }, z) }
};
__vallum__list[$0]__new_const = (n, x) -> { __vallum__common__list_repeat(n, $0____to_data(x)) };

__vallum__map[$0@$1]__length = (self) -> { __vallum__common__list_length(self) };
__vallum__map[$0@$1]__is_empty = (self) -> { () -> { __core__nullList(self) } };
__vallum__map[$0@$1]__get = (self) -> {
    (key) -> { $1__from_data(__vallum__common__map_lookup(self, $0____to_data(key))) }
};
__vallum__map[$0@$1]__get_safe = (self) -> {
    (key) -> { __vallum__common__map_lookup_safe(self, $0____to_data(key)) }
};
__vallum__map[$0@$1]__prepend = (self) -> {
    (key, value) -> { __core__mkCons(__core__mkPairData($0____to_data(key), $1____to_data(value)), self) }
};
__vallum__map[$0@$1]__delete = (self) -> {
    (key) -> {
        (k) -> {
            __vallum__common__list_filter(self, (p) -> { __vallum__common__not(__core__equalsData(__core__fstPair(p), k)) })
        }($0____to_data(key))
    }
};
__vallum__map[$0@$1]__all = (self) -> {
    (pred) -> {
        __vallum__common__list_all(self, (p) -> { pred($0__from_data(__core__fstPair(p)), $1__from_data(__core__sndPair(p))) })
    }
};
__vallum__map[$0@$1]__any = (self) -> {
    (pred) -> {
        __vallum__common__list_any(self, (p) -> { pred($0__from_data(__core__fstPair(p)), $1__from_data(__core__sndPair(p))) })
    }
};
__vallum__map[$0@$1]__filter = (self) -> {
    (pred) -> {
        __vallum__common__list_filter(self, (p) -> { pred($0__from_data(__core__fstPair(p)), $1__from_data(__core__sndPair(p))) })
    }
};
__vallum__map[$0@$1]__keys = (self) -> { () -> { __vallum__common__list_map(self, (p) -> { __core__fstPair(p) }) } };
__vallum__map[$0@$1]__values = (self) -> { () -> { __vallum__common__list_map(self, (p) -> { __core__sndPair(p) }) } };
__vallum__map[$0@$1]__fold[$2] = (self) -> {
    (f, z) -> {
        __vallum__common__list_fold(
            self,
            (acc, p) -> { f(acc, $0__from_data(__core__fstPair(p)), $1__from_data(__core__sndPair(p))) },
            z
        )
    }
};

__vallum__option[$0]__None = __core__constrData(1, __core__mkNilData(()));
__vallum__option[$0]__unwrap = (self) -> {
    () -> {
        __core__ifThenElse(
            __core__equalsInteger(__core__fstPair(__core__unConstrData(self)), 0),
            () -> { $0__from_data(__vallum__common__field(self, 0)) },
            () -> { error("unwrap called on None") }
        )()
    }
};
__vallum__option[$0]__is_some = (self) -> {
    () -> { __core__equalsInteger(__core__fstPair(__core__unConstrData(self)), 0) }
};
__vallum__option[$0]__some____new = (x) -> {
    __core__constrData(0, __core__mkCons($0____to_data(x), __core__mkNilData(())))
};
__vallum__option[$0]__some__some = (self) -> { $0__from_data(__vallum__common__field(self, 0)) };
__vallum__option[$0]__some__unwrap = (self) -> { () -> { $0__from_data(__vallum__common__field(self, 0)) } };
__vallum__option[$0]__some__is_some = (self) -> { () -> { true } };
"#;

const LEDGER: &str = r#"
__vallum__txid__bytes = (self) -> { self };
__vallum__txid__show = (self) -> { () -> { __vallum__common__bytes_show(self) } };
__vallum__txid__new = (b) -> { b };

__vallum__txoutputid__new = (id, index) -> {
    __core__constrData(0, __core__mkCons(__vallum__txid____to_data(id), __core__mkCons(__core__iData(index), __core__mkNilData(()))))
};
__vallum__address__new = (cred) -> {
    __core__constrData(0, __core__mkCons(cred, __core__mkCons(__core__constrData(1, __core__mkNilData(())), __core__mkNilData(()))))
};
__vallum__credential__new_pubkey = (hash) -> {
    __core__constrData(0, __core__mkCons(__core__bData(hash), __core__mkNilData(())))
};
__vallum__credential__new_validator = (hash) -> {
    __core__constrData(1, __core__mkCons(__core__bData(hash), __core__mkNilData(())))
};
__vallum__credential__pubkey____new = (hash) -> { __vallum__credential__new_pubkey(hash) };
__vallum__credential__validator____new = (hash) -> { __vallum__credential__new_validator(hash) };

__vallum__value__ZERO = __core__mapData(__core__mkNilPairData(()));
__vallum__value__from_lovelace = (n) -> {
    __core__mapData(
        __core__mkCons(
            __core__mkPairData(
                __core__bData(#),
                __core__mapData(__core__mkCons(__core__mkPairData(__core__bData(#), __core__iData(n)), __core__mkNilPairData(())))
            ),
            __core__mkNilPairData(())
        )
    )
};
__vallum__value__lovelace = (self) -> { __vallum__common__value_get(self, #, #) };
__vallum__value__get = (self) -> { (mph, name) -> { __vallum__common__value_get(self, mph, name) } };
__vallum__value__contains_policy = (self) -> {
    (mph) -> {
        __vallum__common__list_any(__core__unMapData(self), (p) -> { __core__equalsData(__core__fstPair(p), __core__bData(mph)) })
    }
};

__vallum__tx__is_signed_by = (self) -> {
    (pkh) -> {
        __vallum__common__list_any(
            __core__unListData(__vallum__common__field(self, 8)),
            (d) -> { __core__equalsByteString(__core__unBData(d), pkh) }
        )
    }
};

__vallum__scriptcontext__get_current_minting_policy_hash = (self) -> {
    () -> {
        (purpose) -> {
            __core__ifThenElse(
                __core__equalsInteger(__core__fstPair(__core__unConstrData(purpose)), 0),
                () -> { __core__unBData(__vallum__common__field(purpose, 0)) },
                () -> { error("script purpose is not minting") }
            )()
        }(__vallum__common__field(self, 1))
    }
};
__vallum__scriptcontext__get_spending_output_id = (self) -> {
    () -> {
        (purpose) -> {
            __core__ifThenElse(
                __core__equalsInteger(__core__fstPair(__core__unConstrData(purpose)), 1),
                () -> { __vallum__common__field(purpose, 0) },
                () -> { error("script purpose is not spending") }
            )()
        }(__vallum__common__field(self, 1))
    }
};
__vallum__scriptcontext__get_current_input = (self) -> {
    () -> {
        (id) -> {
            __vallum__common__list_find(
                __core__unListData(__vallum__common__field(__vallum__common__field(self, 0), 0)),
                (input) -> { __core__equalsData(__vallum__common__field(input, 0), id) }
            )
        }(__vallum__scriptcontext__get_spending_output_id(self)())
    }
};
"#;

/// How a builtin type maps between its runtime form and data.
struct Repr {
    to: &'static str,
    from: &'static str,
    eq: &'static str,
    valid: String,
}

fn guarded(check: &str, then: &str) -> String {
    format!("__core__ifThenElse({check}, () -> {{ {then} }}, () -> {{ false }})()")
}

fn bytes_repr() -> Repr {
    Repr {
        to: "__core__bData(self)",
        from: "__core__unBData(data)",
        eq: "__core__equalsByteString(self, other)",
        valid: "__vallum__common__is_bytes(data)".to_string(),
    }
}

fn data_backed(valid: String) -> Repr {
    Repr {
        to: "self",
        from: "data",
        eq: "__core__equalsData(self, other)",
        valid,
    }
}

fn option_validity(some_only: bool) -> String {
    let some = "__vallum__common__and(__core__equalsInteger(tag, 0), () -> { __vallum__common__and(__core__equalsInteger(__vallum__common__list_length(fields), 1), () -> { $0__is_valid_data(__core__headList(fields)) }) })";
    let body = if some_only {
        some.to_string()
    } else {
        format!("__core__ifThenElse(__core__equalsInteger(tag, 1), () -> {{ __core__nullList(fields) }}, () -> {{ {some} }})()")
    };
    guarded(
        "__vallum__common__is_constr(data)",
        &format!("(pair) -> {{ (tag, fields) -> {{ {body} }}(__core__fstPair(pair), __core__sndPair(pair)) }}(__core__unConstrData(data))"),
    )
}

/// Runtime representation of every builtin type, by template path.
fn reprs() -> Vec<(String, Repr)> {
    use BuiltinType as B;
    let hole = || Type::Param(crate::types::ParamType {
        owner: "".into(),
        index: 0,
        name: "T".into(),
        class: crate::types::TypeClass::Any,
    });
    let hole1 = || Type::Param(crate::types::ParamType {
        owner: "".into(),
        index: 1,
        name: "U".into(),
        class: crate::types::TypeClass::Any,
    });
    let int = Repr {
        to: "__core__iData(self)",
        from: "__core__unIData(data)",
        eq: "__core__equalsInteger(self, other)",
        valid: "__vallum__common__is_int(data)".to_string(),
    };
    let real = Repr { valid: int.valid.clone(), ..int };
    let mut out = vec![
        (B::Int.path(), int),
        (B::Real.path(), real),
        (
            B::Bool.path(),
            Repr {
                to: "__core__constrData(__core__ifThenElse(self, 1, 0), __core__mkNilData(()))",
                from: "__core__equalsInteger(__core__fstPair(__core__unConstrData(data)), 1)",
                eq: "__core__ifThenElse(self, other, __vallum__common__not(other))",
                valid: guarded(
                    "__vallum__common__is_constr(data)",
                    "(pair) -> { __vallum__common__and(__core__nullList(__core__sndPair(pair)), () -> { (tag) -> { __core__ifThenElse(__core__equalsInteger(tag, 0), true, __core__equalsInteger(tag, 1)) }(__core__fstPair(pair)) }) }(__core__unConstrData(data))",
                ),
            },
        ),
        (
            B::String.path(),
            Repr {
                to: "__core__bData(__core__encodeUtf8(self))",
                from: "__core__decodeUtf8(__core__unBData(data))",
                eq: "__core__equalsString(self, other)",
                valid: "__vallum__common__is_bytes(data)".to_string(),
            },
        ),
        (B::ByteArray.path(), bytes_repr()),
        (
            B::Data.path(),
            Repr {
                to: "self",
                from: "data",
                eq: "__core__equalsData(self, other)",
                valid: "true".to_string(),
            },
        ),
        (
            B::TxId.path(),
            Repr {
                to: "__core__constrData(0, __core__mkCons(__core__bData(self), __core__mkNilData(())))",
                from: "__core__unBData(__core__headList(__core__sndPair(__core__unConstrData(data))))",
                eq: "__core__equalsByteString(self, other)",
                valid: guarded(
                    "__vallum__common__is_constr(data)",
                    "(pair) -> { __vallum__common__and(__core__equalsInteger(__core__fstPair(pair), 0), () -> { (fields) -> { __vallum__common__and(__vallum__common__not(__core__nullList(fields)), () -> { __vallum__common__is_bytes(__core__headList(fields)) }) }(__core__sndPair(pair)) }) }(__core__unConstrData(data))",
                ),
            },
        ),
        (
            B::List(Box::new(hole())).path(),
            Repr {
                to: "__core__listData(self)",
                from: "__core__unListData(data)",
                eq: "__core__equalsData(__core__listData(self), __core__listData(other))",
                valid: guarded(
                    "__vallum__common__is_list(data)",
                    "__vallum__common__list_all(__core__unListData(data), $0__is_valid_data)",
                ),
            },
        ),
        (
            B::Map(Box::new(hole()), Box::new(hole1())).path(),
            Repr {
                to: "__core__mapData(self)",
                from: "__core__unMapData(data)",
                eq: "__core__equalsData(__core__mapData(self), __core__mapData(other))",
                valid: guarded(
                    "__vallum__common__is_map(data)",
                    "__vallum__common__list_all(__core__unMapData(data), (p) -> { __vallum__common__and($0__is_valid_data(__core__fstPair(p)), () -> { $1__is_valid_data(__core__sndPair(p)) }) })",
                ),
            },
        ),
        (B::Option(Box::new(hole())).path(), data_backed(option_validity(false))),
        (B::OptionSome(Box::new(hole())).path(), data_backed(option_validity(true))),
        (B::Value.path(), data_backed("__vallum__common__is_map(data)".to_string())),
    ];
    for h in HASH_TYPES {
        out.push((h.path(), bytes_repr()));
    }
    for b in [
        B::TxOutputId,
        B::Address,
        B::Credential,
        B::CredentialPubKey,
        B::CredentialValidator,
        B::TxOutput,
        B::TxInput,
        B::Tx,
        B::ScriptContext,
    ] {
        out.push((b.path(), data_backed("__vallum__common__is_constr(data)".to_string())));
    }
    out
}

fn generated_text() -> String {
    let mut out = String::new();
    for (path, r) in reprs() {
        let p = |m: &str| member_path(&path, m);
        out.push_str(&format!("{} = (self) -> {{ {} }};\n", p(members::TO_DATA), r.to));
        out.push_str(&format!("{} = (data) -> {{ {} }};\n", p(members::FROM_DATA), r.from));
        out.push_str(&format!("{} = (data) -> {{ {} }};\n", p(members::IS_VALID_DATA), r.valid));
        out.push_str(&format!("{} = (self) -> {{ (other) -> {{ {} }} }};\n", p(members::EQ), r.eq));
        out.push_str(&format!(
            "{} = (self) -> {{ (other) -> {{ __vallum__common__not({}(self)(other)) }} }};\n",
            p(members::NEQ),
            p(members::EQ)
        ));
        out.push_str(&format!(
            "{} = (self) -> {{ () -> {{ __core__serialiseData({}(self)) }} }};\n",
            p(members::SERIALIZE),
            p(members::TO_DATA)
        ));
    }
    for h in HASH_TYPES {
        let path = h.path();
        for (op, prim, swap) in [
            ("__lt", "lessThanByteString", false),
            ("__leq", "lessThanEqualsByteString", false),
            ("__gt", "lessThanByteString", true),
            ("__geq", "lessThanEqualsByteString", true),
        ] {
            let (a, b) = if swap { ("other", "self") } else { ("self", "other") };
            out.push_str(&format!(
                "{} = (self) -> {{ (other) -> {{ __core__{prim}({a}, {b}) }} }};\n",
                member_path(&path, op)
            ));
        }
        out.push_str(&format!("{} = (self) -> {{ self }};\n", member_path(&path, "bytes")));
        out.push_str(&format!(
            "{} = (self) -> {{ () -> {{ __vallum__common__bytes_show(self) }} }};\n",
            member_path(&path, "show")
        ));
        out.push_str(&format!("{} = (b) -> {{ b }};\n", member_path(&path, "new")));
    }
    // ByteArray orders like the hashes
    let bytes_path = BuiltinType::ByteArray.path();
    for (op, prim, swap) in [
        ("__lt", "lessThanByteString", false),
        ("__leq", "lessThanEqualsByteString", false),
        ("__gt", "lessThanByteString", true),
        ("__geq", "lessThanEqualsByteString", true),
    ] {
        let (a, b) = if swap { ("other", "self") } else { ("self", "other") };
        out.push_str(&format!(
            "{} = (self) -> {{ (other) -> {{ __core__{prim}({a}, {b}) }} }};\n",
            member_path(&bytes_path, op)
        ));
    }
    for (owner, name, index, ty) in record_fields() {
        out.push_str(&format!(
            "{} = (self) -> {{ {}(__vallum__common__field(self, {index})) }};\n",
            member_path(&owner.path(), name),
            members::from_data_path(&ty)
        ));
    }
    out
}

static LIBRARY: Lazy<Result<BTreeMap<String, IrExpr>, String>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    let generated = generated_text();
    for (section, text) in [
        ("common", COMMON),
        ("scalars", SCALARS),
        ("containers", CONTAINERS),
        ("ledger", LEDGER),
        ("generated", generated.as_str()),
    ] {
        let defs = parse_definitions(text).map_err(|e| format!("library section {section}: {e}"))?;
        for (name, expr) in defs {
            if map.insert(name.clone(), expr).is_some() {
                return Err(format!("library section {section} redefines {name}"));
            }
        }
    }
    tracing::debug!(entries = map.len(), "builtin library loaded");
    Ok(map)
});

fn library() -> Result<&'static BTreeMap<String, IrExpr>, CompilerError> {
    LIBRARY
        .as_ref()
        .map_err(|e| CompilerError::internal(e.clone()))
}

/// A non-generic library definition.
pub fn lookup(name: &str) -> Result<Option<IrExpr>, CompilerError> {
    if name.contains('$') {
        return Ok(None);
    }
    Ok(library()?.get(name).cloned())
}

/// A generic library definition keyed with `$<i>` holes.
pub fn template(key: &str) -> Result<Option<IrExpr>, CompilerError> {
    if !key.contains('$') {
        return Ok(None);
    }
    Ok(library()?.get(key).cloned())
}

pub fn keys() -> Result<Vec<String>, CompilerError> {
    Ok(library()?.keys().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::split_instance_name;
    use crate::primitives::is_primitive;

    fn samples() -> Vec<Type> {
        use BuiltinType as B;
        let mut out: Vec<Type> = crate::types::NAMED_BUILTINS
            .iter()
            .map(|(_, b)| Type::Builtin(b.clone()))
            .collect();
        out.push(Type::list(Type::int()));
        out.push(Type::map(Type::bytes(), Type::int()));
        out.push(Type::option(Type::int()));
        out.push(Type::Builtin(B::OptionSome(Box::new(Type::int()))));
        out.push(Type::Builtin(B::CredentialPubKey));
        out.push(Type::Builtin(B::CredentialValidator));
        out
    }

    fn resolves(name: &str) -> bool {
        if is_primitive(name) || lookup(name).expect("library").is_some() {
            return true;
        }
        match split_instance_name(name) {
            Some((key, _)) => template(&key).expect("library").is_some(),
            None => false,
        }
    }

    #[test]
    fn every_builtin_member_has_ir() {
        let missing: Vec<String> = members::builtin_member_paths(&samples())
            .into_iter()
            .filter(|p| !resolves(p))
            .collect();
        assert!(missing.is_empty(), "missing library entries: {missing:?}");
    }

    #[test]
    fn library_is_closed() {
        for key in keys().expect("library") {
            let body = lookup(&key)
                .expect("library")
                .or_else(|| template(&key).expect("library"))
                .expect("listed key");
            for name in body.free_names() {
                if name.contains('$') {
                    assert!(key.contains('$'), "{key} uses hole {name}");
                    continue;
                }
                assert!(resolves(&name), "{key} references unknown {name}");
            }
        }
    }

    #[test]
    fn templates_and_plain_entries_are_split() {
        assert!(lookup("__vallum__list[$0]__length").expect("library").is_none());
        assert!(template("__vallum__list[$0]__length").expect("library").is_some());
        assert!(template("__vallum__int____add").expect("library").is_none());
        assert!(lookup("__vallum__tx__signatories").expect("library").is_some());
    }
}
