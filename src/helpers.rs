//! Runtime helper registry.
//!
//! The lowering only *names* helpers; their JavaScript sources live here and
//! the harness prepends the referenced ones (each once, in registry order) to
//! the generated code. The `applyDecs*` revisions share one core routine the
//! same way the upstream runtime shares a factory between its revisions; the
//! revision entry points only differ in flag decoding and return shape.
//!
//! Contract targeted by the emitted code:
//! - a decoration tuple is `[decs, flag, name, ...closures]`: `decs` is a
//!   single decorator expression, or an array, or (receiver-tracking
//!   revisions, flag bit 16) an array of flattened `[thisArg, decorator]`
//!   pairs;
//! - `flag` packs the element kind and staticness per
//!   [`VersionPolicy::element_flag`](crate::options::VersionPolicy);
//! - `name` is the property key without any `#` prefix; privateness is
//!   signalled by the trailing closures (get/set pair for private fields and
//!   accessors, the extracted callable for private methods and accessors'
//!   getters/setters);
//! - the `e` array yields, per element in call order: `[init]` for fields and
//!   public accessors, `[get, set, init]` for private accessors, `[fn]` for
//!   private method-likes, nothing for public method-likes; then a proto-init
//!   thunk iff any decorated instance method-like exists, then a static-init
//!   thunk iff any decorated static method-like exists;
//! - the `c` array is `[decoratedClass, classInit]` when class decorators
//!   were supplied, else empty. Flat-shaped revisions return `e.concat(c)`.

use rustc_hash::FxHashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Helper {
    ApplyDecsCore,
    ApplyDecs,
    ApplyDecs2203,
    ApplyDecs2203R,
    ApplyDecs2301,
    ApplyDecs2305,
    SetFunctionName,
    ToPropertyKey,
    ToPrimitive,
    Identity,
}

/// Registry order; also the order helpers appear in the prelude.
const ALL: [Helper; 10] = [
    Helper::ApplyDecsCore,
    Helper::ApplyDecs,
    Helper::ApplyDecs2203,
    Helper::ApplyDecs2203R,
    Helper::ApplyDecs2301,
    Helper::ApplyDecs2305,
    Helper::SetFunctionName,
    Helper::ToPropertyKey,
    Helper::ToPrimitive,
    Helper::Identity,
];

impl Helper {
    /// The identifier the emitted code references.
    pub fn name(self) -> &'static str {
        match self {
            Self::ApplyDecsCore => "_applyDecsCore",
            Self::ApplyDecs => "_applyDecs",
            Self::ApplyDecs2203 => "_applyDecs2203",
            Self::ApplyDecs2203R => "_applyDecs2203R",
            Self::ApplyDecs2301 => "_applyDecs2301",
            Self::ApplyDecs2305 => "_applyDecs2305",
            Self::SetFunctionName => "_setFunctionName",
            Self::ToPropertyKey => "_toPropertyKey",
            Self::ToPrimitive => "_toPrimitive",
            Self::Identity => "_identity",
        }
    }

    fn dependencies(self) -> &'static [Helper] {
        match self {
            Self::ApplyDecs
            | Self::ApplyDecs2203
            | Self::ApplyDecs2203R
            | Self::ApplyDecs2301
            | Self::ApplyDecs2305 => &[Helper::ApplyDecsCore],
            Self::ToPropertyKey => &[Helper::ToPrimitive],
            _ => &[],
        }
    }

    fn source(self) -> &'static str {
        match self {
            Self::ApplyDecsCore => APPLY_DECS_CORE,
            Self::ApplyDecs => {
                "function _applyDecs(target, memberDecs, classDecs) {\n\
                 \x20 var r = _applyDecsCore(target, memberDecs, classDecs, 0, 0, void 0);\n\
                 \x20 return r.e.concat(r.c);\n\
                 }\n"
            }
            Self::ApplyDecs2203 => {
                "function _applyDecs2203(target, memberDecs, classDecs) {\n\
                 \x20 var r = _applyDecsCore(target, memberDecs, classDecs, 0, 0, void 0);\n\
                 \x20 return r.e.concat(r.c);\n\
                 }\n"
            }
            Self::ApplyDecs2203R => {
                "function _applyDecs2203R(target, memberDecs, classDecs) {\n\
                 \x20 return _applyDecsCore(target, memberDecs, classDecs, 0, 0, void 0);\n\
                 }\n"
            }
            Self::ApplyDecs2301 => {
                "function _applyDecs2301(target, memberDecs, classDecs, instanceBrand) {\n\
                 \x20 return _applyDecsCore(target, memberDecs, classDecs, 0, instanceBrand, void 0);\n\
                 }\n"
            }
            Self::ApplyDecs2305 => {
                "function _applyDecs2305(target, memberDecs, classDecs, classDecsFlag, instanceBrand, parentClass) {\n\
                 \x20 return _applyDecsCore(target, memberDecs, classDecs, 8 | (classDecsFlag ? 32 : 0), instanceBrand, parentClass);\n\
                 }\n"
            }
            Self::SetFunctionName => {
                "function _setFunctionName(fn, name, prefix) {\n\
                 \x20 if (typeof name === \"symbol\") name = name.description ? \"[\" + name.description + \"]\" : \"\";\n\
                 \x20 try {\n\
                 \x20   Object.defineProperty(fn, \"name\", { configurable: true, value: prefix ? prefix + \" \" + name : name });\n\
                 \x20 } catch (_) {}\n\
                 \x20 return fn;\n\
                 }\n"
            }
            Self::ToPropertyKey => {
                "function _toPropertyKey(arg) {\n\
                 \x20 var key = _toPrimitive(arg, \"string\");\n\
                 \x20 return typeof key === \"symbol\" ? key : String(key);\n\
                 }\n"
            }
            Self::ToPrimitive => {
                "function _toPrimitive(input, hint) {\n\
                 \x20 if (typeof input !== \"object\" || input === null) return input;\n\
                 \x20 var prim = input[Symbol.toPrimitive];\n\
                 \x20 if (prim !== void 0) {\n\
                 \x20   var res = prim.call(input, hint || \"default\");\n\
                 \x20   if (typeof res !== \"object\") return res;\n\
                 \x20   throw new TypeError(\"@@toPrimitive must return a primitive value.\");\n\
                 \x20 }\n\
                 \x20 return (hint === \"string\" ? String : Number)(input);\n\
                 }\n"
            }
            Self::Identity => "function _identity(x) {\n\x20 return x;\n}\n",
        }
    }
}

const APPLY_DECS_CORE: &str = r##"function _applyDecsCore(target, memberDecs, classDecs, coreFlags, instanceBrand, parentClass) {
  var staticBit = coreFlags & 8, classPairs = coreFlags & 32;
  var KINDS = ["field", "accessor", "method", "getter", "setter"];
  var metadata = Object.create(null);
  var e = [], protoExtras = [], staticExtras = [], needProto = false, needStatic = false;
  function assertBrand(receiver) {
    if (instanceBrand && !instanceBrand(receiver)) {
      throw new TypeError("Attempted to access private element on non-instance");
    }
    return receiver;
  }
  function assertCallable(value, what) {
    if (typeof value !== "function") throw new TypeError(what + " must be a function");
    return value;
  }
  function makeInit(inits, extras) {
    return function (receiver, value) {
      for (var i = 0; i < extras.length; i++) extras[i].call(receiver);
      for (var j = 0; j < inits.length; j++) value = inits[j].call(receiver, value);
      return value;
    };
  }
  function makeRunner(extras) {
    return function (receiver) {
      for (var i = 0; i < extras.length; i++) extras[i].call(receiver);
      return receiver;
    };
  }
  for (var i = 0; i < memberDecs.length; i++) {
    var entry = memberDecs[i];
    var decs = [].concat(entry[0]), flag = entry[1], name = entry[2];
    var isStatic = staticBit ? !!(flag & 8) : flag >= 5;
    var kind = staticBit ? flag & 7 : isStatic ? flag - 5 : flag;
    var pairs = !!(flag & 16);
    var isPrivate = entry.length > 3;
    var base = isStatic ? target : target.prototype;
    var getter, setter, value, desc;
    if (kind === 0 || kind === 1) {
      if (isPrivate) {
        getter = entry[3];
        setter = entry[4];
      } else if (kind === 1) {
        desc = Object.getOwnPropertyDescriptor(base, name);
        getter = desc.get;
        setter = desc.set;
      }
    } else if (isPrivate) {
      value = entry[3];
      if (kind === 3) getter = value;
      if (kind === 4) setter = value;
    } else {
      desc = Object.getOwnPropertyDescriptor(base, name);
      value = kind === 3 ? desc.get : kind === 4 ? desc.set : desc.value;
    }
    var inits = [], extras = [], done = false;
    var access = {
      has: isPrivate
        ? instanceBrand && !isStatic ? instanceBrand : function (obj) { return obj instanceof target; }
        : function (obj) { return name in obj; },
      get:
        kind === 4
          ? void 0
          : isPrivate
            ? kind === 2
              ? function (obj) { assertBrand(obj); return value; }
              : function (obj) { return getter.call(assertBrand(obj)); }
            : function (obj) { return obj[name]; },
      set:
        kind === 2 || kind === 3
          ? void 0
          : isPrivate
            ? function (obj, v) { setter.call(assertBrand(obj), v); }
            : function (obj, v) { obj[name] = v; }
    };
    for (var j = decs.length - 1; j >= 0; j--) {
      var dec, receiver;
      if (pairs) {
        dec = decs[j];
        receiver = decs[j - 1];
        j--;
      } else {
        dec = decs[j];
      }
      done = false;
      var ctx = {
        kind: KINDS[kind],
        name: isPrivate ? "#" + name : name,
        static: isStatic,
        private: isPrivate,
        metadata: metadata,
        access: access,
        addInitializer: function (fn) {
          if (done) throw new TypeError("attempted to call addInitializer after decoration was finished");
          extras.push(assertCallable(fn, "An initializer"));
        }
      };
      var result;
      if (kind === 0) result = dec.call(receiver, void 0, ctx);
      else if (kind === 1) result = dec.call(receiver, { get: getter, set: setter }, ctx);
      else result = dec.call(receiver, value, ctx);
      done = true;
      if (result === void 0) continue;
      if (kind === 0) {
        inits.push(assertCallable(result, "A field initializer"));
      } else if (kind === 1) {
        if (typeof result !== "object" || result === null) {
          throw new TypeError("accessor decorators must return an object with get, set, or init properties or undefined");
        }
        if (result.get !== void 0) getter = assertCallable(result.get, "accessor.get");
        if (result.set !== void 0) setter = assertCallable(result.set, "accessor.set");
        if (result.init !== void 0) inits.push(assertCallable(result.init, "accessor.init"));
      } else {
        value = assertCallable(result, "A method decorator result");
        if (kind === 3) getter = value;
        if (kind === 4) setter = value;
      }
    }
    if (kind === 0) {
      e.push(makeInit(inits, extras));
    } else if (kind === 1) {
      if (isPrivate) {
        e.push(
          function (obj) { return getter.call(obj); },
          function (obj, v) { setter.call(obj, v); },
          makeInit(inits, extras)
        );
      } else {
        Object.defineProperty(base, name, { get: getter, set: setter, enumerable: false, configurable: true });
        e.push(makeInit(inits, extras));
      }
    } else {
      if (isPrivate) {
        e.push(value);
      } else {
        if (kind === 2) desc.value = value;
        else if (kind === 3) desc.get = value;
        else desc.set = value;
        Object.defineProperty(base, name, desc);
      }
      if (isStatic) {
        needStatic = true;
        staticExtras.push.apply(staticExtras, extras);
      } else {
        needProto = true;
        protoExtras.push.apply(protoExtras, extras);
      }
    }
  }
  if (needProto) e.push(makeRunner(protoExtras));
  if (needStatic) e.push(makeRunner(staticExtras));
  var c = [];
  if (classDecs.length > 0) {
    var newClass = target, classExtras = [], classDone = false;
    for (var q = classDecs.length - 1; q >= 0; q--) {
      var classDec, classReceiver;
      if (classPairs) {
        classDec = classDecs[q];
        classReceiver = classDecs[q - 1];
        q--;
      } else {
        classDec = classDecs[q];
      }
      classDone = false;
      var classCtx = {
        kind: "class",
        name: target.name,
        metadata: metadata,
        addInitializer: function (fn) {
          if (classDone) throw new TypeError("attempted to call addInitializer after decoration was finished");
          classExtras.push(assertCallable(fn, "An initializer"));
        }
      };
      var replaced = classDec.call(classReceiver, newClass, classCtx);
      classDone = true;
      if (replaced !== void 0) {
        newClass = assertCallable(replaced, "A class decorator result");
      }
    }
    c = [
      newClass,
      function () {
        for (var w = 0; w < classExtras.length; w++) classExtras[w].call(newClass);
      }
    ];
  }
  return { e: e, c: c };
}
"##;

/// Tracks which helpers the pass referenced so the harness can prepend
/// exactly those sources.
#[derive(Debug, Default)]
pub struct HelperRegistry {
    used: FxHashSet<Helper>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a helper as referenced and returns its emitted name.
    pub fn require(&mut self, helper: Helper) -> &'static str {
        self.used.insert(helper);
        helper.name()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// The helper sources to prepend, dependencies resolved, each once, in
    /// registry order.
    pub fn prelude(&self) -> String {
        let mut wanted = self.used.clone();
        loop {
            let mut grew = false;
            for helper in ALL {
                if wanted.contains(&helper) {
                    for dep in helper.dependencies() {
                        grew |= wanted.insert(*dep);
                    }
                }
            }
            if !grew {
                break;
            }
        }
        let mut out = String::new();
        for helper in ALL {
            if wanted.contains(&helper) {
                out.push_str(helper.source());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_carries_every_revision() {
        for helper in [
            Helper::ApplyDecs,
            Helper::ApplyDecs2203,
            Helper::ApplyDecs2203R,
            Helper::ApplyDecs2301,
            Helper::ApplyDecs2305,
        ] {
            assert!(helper.source().starts_with(&format!("function {}(", helper.name())));
        }
    }

    #[test]
    fn prelude_pulls_dependencies_once() {
        let mut registry = HelperRegistry::new();
        registry.require(Helper::ApplyDecs2305);
        registry.require(Helper::ToPropertyKey);
        registry.require(Helper::ToPropertyKey);
        let prelude = registry.prelude();
        assert_eq!(prelude.matches("function _applyDecsCore(").count(), 1);
        assert_eq!(prelude.matches("function _applyDecs2305(").count(), 1);
        assert_eq!(prelude.matches("function _toPrimitive(").count(), 1);
        assert_eq!(prelude.matches("function _toPropertyKey(").count(), 1);
        assert!(!prelude.contains("function _applyDecs2301("));
        assert!(!prelude.contains("function _setFunctionName("));
    }

    #[test]
    fn empty_registry_emits_nothing() {
        let registry = HelperRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.prelude().is_empty());
    }
}
